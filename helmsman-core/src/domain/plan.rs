//! Change plan produced by the requirement analyzer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured change plan derived from a requirement document
///
/// This is the analyzer's answer payload parsed into the pipeline's own
/// shape: which files change, what their new contents are, and any
/// parameters the build should receive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangePlan {
    #[serde(default)]
    pub files_to_modify: Vec<String>,
    #[serde(default)]
    pub file_changes: BTreeMap<String, String>,
    #[serde(default)]
    pub git_strategy: Option<String>,
    #[serde(default, rename = "jenkins_params")]
    pub build_params: BTreeMap<String, String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl ChangePlan {
    /// Commit message describing this plan
    pub fn commit_message(&self) -> String {
        match &self.summary {
            Some(summary) => format!("Automated update: {summary}"),
            None => "Automated update".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_analyzer_answer() {
        let raw = r#"{
            "files_to_modify": ["src/login.rs"],
            "file_changes": {"src/login.rs": "fn login() {}"},
            "git_strategy": "feature branch",
            "jenkins_params": {"ENV": "dev"}
        }"#;
        let plan: ChangePlan = serde_json::from_str(raw).unwrap();
        assert_eq!(plan.files_to_modify, vec!["src/login.rs"]);
        assert_eq!(plan.build_params["ENV"], "dev");
        assert!(plan.summary.is_none());
    }

    #[test]
    fn commit_message_uses_summary_when_present() {
        let mut plan = ChangePlan::default();
        assert_eq!(plan.commit_message(), "Automated update");
        plan.summary = Some("add captcha to login".to_string());
        assert_eq!(plan.commit_message(), "Automated update: add captcha to login");
    }
}
