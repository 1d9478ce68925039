//! Requirement analyzer wire payloads
//!
//! The analyzer is a text-generation service with a blocking completion
//! endpoint; the structured change plan travels as JSON inside the
//! `answer` string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub inputs: Value,
    pub query: String,
    pub response_mode: String,
    pub user: String,
}

impl CompletionRequest {
    pub fn blocking(query: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            inputs: Value::Object(serde_json::Map::new()),
            query: query.into(),
            response_mode: "blocking".to_string(),
            user: user.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub answer: Option<String>,
}
