//! Requirement analysis
//!
//! Turns a free-text requirement document into a structured [`ChangePlan`]
//! through one prompt/response call against the analyzer service. The
//! trait seam exists so the orchestrator can be exercised with a fake.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use helmsman_client::{AnalyzerClient, ClientError};
use helmsman_core::domain::plan::ChangePlan;

const PROMPT_HEADER: &str = "\
Produce a code change plan for the following requirement document.

Answer with JSON only, shaped exactly like:
{
  \"files_to_modify\": [\"path/to/file\"],
  \"file_changes\": {\"path/to/file\": \"new file content\"},
  \"git_strategy\": \"branching strategy description\",
  \"jenkins_params\": {\"KEY\": \"value\"},
  \"summary\": \"one line describing the change\"
}

Requirement document:
";

/// Errors from the analysis step
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("analyzer call failed: {0}")]
    Call(#[from] ClientError),

    /// The analyzer answered, but with an error payload
    #[error("analyzer rejected the document: {0}")]
    Rejected(String),

    /// The answer was not a usable change plan
    #[error("analyzer answer is not a change plan: {0}")]
    InvalidPlan(String),
}

/// Derives a change plan from a requirement document
#[async_trait]
pub trait RequirementAnalyzer: Send + Sync {
    async fn analyze(&self, document: &str) -> Result<ChangePlan, AnalyzeError>;
}

/// Analyzer backed by the completion endpoint
pub struct CompletionAnalyzer {
    client: AnalyzerClient,
}

impl CompletionAnalyzer {
    pub fn new(client: AnalyzerClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequirementAnalyzer for CompletionAnalyzer {
    async fn analyze(&self, document: &str) -> Result<ChangePlan, AnalyzeError> {
        let prompt = format!("{PROMPT_HEADER}{document}");
        let answer = self.client.completion(&prompt, "helmsman").await?;
        debug!("Analyzer answered {} byte(s)", answer.len());

        parse_plan(&answer)
    }
}

/// Parses the analyzer's answer text into a change plan
///
/// An object carrying an `error` field is a rejection; anything that does
/// not deserialize into a plan is invalid. Code fences around the JSON
/// are tolerated.
pub fn parse_plan(answer: &str) -> Result<ChangePlan, AnalyzeError> {
    let trimmed = strip_code_fence(answer.trim());

    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| AnalyzeError::InvalidPlan(e.to_string()))?;

    if let Some(error) = value.get("error").and_then(|v| v.as_str()) {
        return Err(AnalyzeError::Rejected(error.to_string()));
    }

    serde_json::from_value(value).map_err(|e| AnalyzeError::InvalidPlan(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") up to the first newline
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_json_answer() {
        let plan = parse_plan(
            r#"{"files_to_modify": ["a.rs"], "file_changes": {"a.rs": "x"}, "summary": "s"}"#,
        )
        .unwrap();
        assert_eq!(plan.files_to_modify, vec!["a.rs"]);
        assert_eq!(plan.summary.as_deref(), Some("s"));
    }

    #[test]
    fn parses_a_fenced_answer() {
        let answer = "```json\n{\"files_to_modify\": [\"b.rs\"]}\n```";
        let plan = parse_plan(answer).unwrap();
        assert_eq!(plan.files_to_modify, vec!["b.rs"]);
    }

    #[test]
    fn error_payload_is_a_rejection() {
        let err = parse_plan(r#"{"error": "empty document"}"#).unwrap_err();
        assert!(matches!(err, AnalyzeError::Rejected(msg) if msg == "empty document"));
    }

    #[test]
    fn non_json_answer_is_invalid() {
        let err = parse_plan("I could not analyze this.").unwrap_err();
        assert!(matches!(err, AnalyzeError::InvalidPlan(_)));
    }
}
