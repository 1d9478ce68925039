//! Requirement analyzer client
//!
//! One blocking completion call against a text-generation service. The
//! caller owns prompt construction and answer parsing; this client only
//! moves the text.

use reqwest::Client;

use crate::error::{ClientError, Result};
use crate::response;
use helmsman_core::dto::analyzer::{CompletionRequest, CompletionResponse};

/// Bearer-token client for the analyzer completion endpoint
#[derive(Debug, Clone)]
pub struct AnalyzerClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl AnalyzerClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Sends a prompt and returns the raw answer text
    pub async fn completion(&self, query: &str, user: &str) -> Result<String> {
        let url = format!("{}/completion-messages", self.base_url);
        let payload = CompletionRequest::blocking(query, user);

        let http_response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let body: CompletionResponse = response::json(http_response).await?;

        body.answer
            .ok_or_else(|| ClientError::ParseError("completion response has no answer".into()))
    }
}
