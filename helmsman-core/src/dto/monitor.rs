//! Monitoring backend wire payloads
//!
//! Plain JSON request/response pairs keyed by an opaque session id.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionRequest {
    pub project_name: String,
    pub pipeline_name: String,
    pub description: String,
    pub start_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub message: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateStageRequest {
    pub name: String,
    pub status: String,
    pub description: String,
    pub start_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStageResponse {
    pub stage_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateStageRequest {
    pub status: String,
    pub message: String,
    /// Only set once the stage reaches a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppendLogRequest {
    pub message: String,
    pub level: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseSessionRequest {
    pub status: String,
    pub summary: String,
    pub end_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

/// Session state as reported back by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub status: String,
    #[serde(default)]
    pub stages: Vec<serde_json::Value>,
}
