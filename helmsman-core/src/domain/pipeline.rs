//! Pipeline result types

use serde::{Deserialize, Serialize};

/// Final outcome of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    /// Name of the stage that aborted the run, when it failed
    pub stage: Option<String>,
    pub error: Option<String>,
    pub duration_seconds: u64,
}

impl PipelineResult {
    pub fn succeeded(duration_seconds: u64) -> Self {
        Self {
            success: true,
            stage: None,
            error: None,
            duration_seconds,
        }
    }

    pub fn failed(
        stage: impl Into<String>,
        error: impl Into<String>,
        duration_seconds: u64,
    ) -> Self {
        Self {
            success: false,
            stage: Some(stage.into()),
            error: Some(error.into()),
            duration_seconds,
        }
    }
}
