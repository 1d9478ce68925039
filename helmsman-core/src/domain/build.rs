//! Build domain types
//!
//! The pipeline's view of a build on the external build server: a queued
//! request that may resolve into a numbered build, and the statuses that
//! build moves through.

use serde::{Deserialize, Serialize};

/// Opaque token for a build request the server has accepted but not yet
/// scheduled
///
/// Wraps the queue URL returned in the trigger response's Location header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedItem(String);

impl QueuedItem {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self(queue_url.into())
    }

    pub fn url(&self) -> &str {
        &self.0
    }
}

/// A scheduled build, identified by job name and build number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub job: String,
    pub number: u32,
}

impl Build {
    pub fn new(job: impl Into<String>, number: u32) -> Self {
        Self {
            job: job.into(),
            number,
        }
    }
}

/// Status of a build as reported by the build server
///
/// Terminal outcomes carry the server's result field verbatim; anything
/// the server reports that we do not recognize maps to `Unknown` rather
/// than failing the poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    InProgress,
    Success,
    Failure,
    Aborted,
    Unknown,
}

impl BuildStatus {
    /// Parses the `result` field of a finished build
    pub fn from_result(result: &str) -> Self {
        match result {
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            "ABORTED" => Self::Aborted,
            _ => Self::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Aborted => "ABORTED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_results() {
        assert_eq!(BuildStatus::from_result("SUCCESS"), BuildStatus::Success);
        assert_eq!(BuildStatus::from_result("FAILURE"), BuildStatus::Failure);
        assert_eq!(BuildStatus::from_result("ABORTED"), BuildStatus::Aborted);
    }

    #[test]
    fn unrecognized_result_is_unknown_not_an_error() {
        assert_eq!(
            BuildStatus::from_result("NOT_BUILT"),
            BuildStatus::Unknown
        );
        assert!(BuildStatus::Unknown.is_terminal());
    }

    #[test]
    fn in_progress_is_the_only_non_terminal_status() {
        assert!(!BuildStatus::InProgress.is_terminal());
        assert!(BuildStatus::Success.is_terminal());
        assert!(BuildStatus::Failure.is_terminal());
        assert!(BuildStatus::Aborted.is_terminal());
    }
}
