//! Notification domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One logical deployment event, fanned out to every channel
///
/// Read-only template-fill data; constructed once per dispatch and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub project: String,
    pub environment: String,
    pub status: String,
    pub version: Option<String>,
    pub details: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl NotificationEvent {
    pub fn new(
        project: impl Into<String>,
        environment: impl Into<String>,
        status: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            environment: environment.into(),
            status: status.into(),
            version: None,
            details: details.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Flattens the event into the placeholder map used by channel templates
    pub fn template_data(&self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert("project_name".to_string(), self.project.clone());
        data.insert("environment".to_string(), self.environment.clone());
        data.insert("status".to_string(), self.status.clone());
        data.insert(
            "version".to_string(),
            self.version.clone().unwrap_or_else(|| "unknown".to_string()),
        );
        data.insert(
            "timestamp".to_string(),
            self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        data.insert("details".to_string(), self.details.clone());
        data
    }
}

/// Aggregate classification of a fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    AllSucceeded,
    PartialSuccess,
    AllFailed,
}

/// Per-channel results of one dispatch
///
/// A channel either completed its send attempt (true/false) or is absent
/// from the map entirely; a slot is written exactly once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationOutcome {
    results: BTreeMap<String, bool>,
}

impl NotificationOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, channel: impl Into<String>, success: bool) {
        self.results.insert(channel.into(), success);
    }

    /// Number of channels that were attempted
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    /// Number of channels that reported success
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|ok| **ok).count()
    }

    pub fn results(&self) -> &BTreeMap<String, bool> {
        &self.results
    }

    /// Classifies the outcome for the orchestrator's stage status
    ///
    /// An empty outcome (nothing was attempted) counts as `AllFailed`.
    pub fn verdict(&self) -> Verdict {
        let succeeded = self.succeeded();
        if succeeded == 0 {
            Verdict::AllFailed
        } else if succeeded == self.attempted() {
            Verdict::AllSucceeded
        } else {
            Verdict::PartialSuccess
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_buckets() {
        let mut outcome = NotificationOutcome::new();
        assert_eq!(outcome.verdict(), Verdict::AllFailed);

        outcome.record("chat", true);
        outcome.record("email", true);
        assert_eq!(outcome.verdict(), Verdict::AllSucceeded);

        outcome.record("wecom", false);
        assert_eq!(outcome.verdict(), Verdict::PartialSuccess);
        assert_eq!(outcome.attempted(), 3);
        assert_eq!(outcome.succeeded(), 2);
    }

    #[test]
    fn all_failed_when_no_channel_succeeds() {
        let mut outcome = NotificationOutcome::new();
        outcome.record("chat", false);
        outcome.record("email", false);
        assert_eq!(outcome.verdict(), Verdict::AllFailed);
    }

    #[test]
    fn template_data_substitutes_missing_version() {
        let event = NotificationEvent::new("svc", "dev", "success", "details");
        let data = event.template_data();
        assert_eq!(data["version"], "unknown");
        assert_eq!(data["project_name"], "svc");

        let event = event.with_version("v1.2.0");
        assert_eq!(event.template_data()["version"], "v1.2.0");
    }
}
