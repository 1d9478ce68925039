//! Stage and session domain types

use serde::{Deserialize, Serialize};

/// Status of a single pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Warning,
}

impl StageStatus {
    /// Whether the stage has reached a state it can no longer leave
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Warning)
    }

    /// Wire representation expected by the monitoring backend
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Warning => "warning",
        }
    }
}

/// Status of a monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Success,
    Failed,
    Warning,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Warning => "warning",
        }
    }
}

/// Handle identifying a stage for later updates
///
/// When a monitoring session is open the backend assigns the identifier.
/// Without a session the stage name itself serves as a local identity, so
/// callers can treat the handle uniformly either way. The two cases are
/// kept as distinct variants rather than bare strings so a backend id can
/// never be confused with a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageHandle {
    /// Identifier issued by the monitoring backend
    Remote(String),
    /// Fallback identity when no session is active
    Local(String),
}

impl StageHandle {
    /// The raw identifier, whichever side issued it
    pub fn id(&self) -> &str {
        match self {
            Self::Remote(id) | Self::Local(id) => id,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Locally tracked record of one pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub handle: StageHandle,
    pub status: StageStatus,
    pub message: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl StageRecord {
    /// Creates a record for a stage that has just started running
    pub fn started(name: impl Into<String>, handle: StageHandle) -> Self {
        Self {
            name: name.into(),
            handle,
            status: StageStatus::Running,
            message: String::new(),
            started_at: chrono::Utc::now(),
            ended_at: None,
        }
    }

    /// Moves the record into a terminal status
    pub fn finish(&mut self, status: StageStatus, message: impl Into<String>) {
        self.status = status;
        self.message = message.into();
        self.ended_at = Some(chrono::Utc::now());
    }
}

/// Log severity mirrored to the monitoring backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}
