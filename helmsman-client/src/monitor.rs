//! Monitoring backend client
//!
//! Plain JSON request/response pairs keyed by an opaque session id. This
//! client reports errors like any other; the graceful-degrade behavior
//! (monitoring must never gate the pipeline) lives in the session wrapper
//! in `helmsman-pipeline`, not here.

use reqwest::Client;

use crate::error::Result;
use crate::response;
use helmsman_core::domain::stage::{LogLevel, SessionStatus, StageStatus};
use helmsman_core::dto::monitor::{
    AppendLogRequest, CloseSessionRequest, CreateSessionRequest, CreateSessionResponse,
    CreateStageRequest, CreateStageResponse, SessionInfo, UpdateStageRequest,
    UpdateStatusRequest,
};

/// Bearer-token client for the monitoring backend
#[derive(Debug, Clone)]
pub struct MonitorClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl MonitorClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Opens a new monitoring session and returns its id
    pub async fn create_session(
        &self,
        project_name: &str,
        pipeline_name: &str,
        description: &str,
    ) -> Result<String> {
        let url = format!("{}/sessions", self.base_url);
        let payload = CreateSessionRequest {
            project_name: project_name.to_string(),
            pipeline_name: pipeline_name.to_string(),
            description: description.to_string(),
            start_time: chrono::Utc::now().timestamp(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let body: CreateSessionResponse = response::json(response).await?;
        Ok(body.session_id)
    }

    /// Updates the overall session status
    pub async fn update_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        message: &str,
    ) -> Result<()> {
        let url = format!("{}/sessions/{}/status", self.base_url, session_id);
        let payload = UpdateStatusRequest {
            status: status.as_str().to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        response::empty(response).await
    }

    /// Registers a stage and returns the backend-issued stage id
    pub async fn create_stage(
        &self,
        session_id: &str,
        name: &str,
        status: StageStatus,
        description: &str,
    ) -> Result<String> {
        let url = format!("{}/sessions/{}/stages", self.base_url, session_id);
        let payload = CreateStageRequest {
            name: name.to_string(),
            status: status.as_str().to_string(),
            description: description.to_string(),
            start_time: chrono::Utc::now().timestamp(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let body: CreateStageResponse = response::json(response).await?;
        Ok(body.stage_id)
    }

    /// Updates a stage; terminal statuses also record an end time
    pub async fn update_stage(
        &self,
        session_id: &str,
        stage_id: &str,
        status: StageStatus,
        message: &str,
    ) -> Result<()> {
        let url = format!(
            "{}/sessions/{}/stages/{}",
            self.base_url, session_id, stage_id
        );
        let payload = UpdateStageRequest {
            status: status.as_str().to_string(),
            message: message.to_string(),
            end_time: status
                .is_terminal()
                .then(|| chrono::Utc::now().timestamp()),
        };

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        response::empty(response).await
    }

    /// Appends a log line, optionally attached to a stage
    pub async fn append_log(
        &self,
        session_id: &str,
        message: &str,
        level: LogLevel,
        stage_id: Option<&str>,
    ) -> Result<()> {
        let url = format!("{}/sessions/{}/logs", self.base_url, session_id);
        let payload = AppendLogRequest {
            message: message.to_string(),
            level: level.as_str().to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            stage_id: stage_id.map(str::to_string),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        response::empty(response).await
    }

    /// Closes the session with a final status and summary
    pub async fn close_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        summary: &str,
        duration: Option<i64>,
    ) -> Result<()> {
        let url = format!("{}/sessions/{}/close", self.base_url, session_id);
        let payload = CloseSessionRequest {
            status: status.as_str().to_string(),
            summary: summary.to_string(),
            end_time: chrono::Utc::now().timestamp(),
            duration,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        response::empty(response).await
    }

    /// Reads the session back, for diagnostics only
    pub async fn session_status(&self, session_id: &str) -> Result<SessionInfo> {
        let url = format!("{}/sessions/{}", self.base_url, session_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        response::json(response).await
    }
}
