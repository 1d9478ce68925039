//! Build server wire payloads (Jenkins-style JSON API)

use serde::{Deserialize, Serialize};

/// Subset of `/job/{name}/api/json` used to probe for parameterization
#[derive(Debug, Clone, Deserialize)]
pub struct JobInfo {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub property: Vec<JobProperty>,
}

impl JobInfo {
    /// Whether the job declares build parameters
    pub fn is_parameterized(&self) -> bool {
        self.property
            .iter()
            .any(|p| p.class.contains("ParametersDefinitionProperty"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobProperty {
    #[serde(default, rename = "_class")]
    pub class: String,
}

/// Queue item state from `{queue_url}api/json`
///
/// The item carries an `executable` once the scheduler has turned it into
/// a real build, or `cancelled` if it never will.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueItemInfo {
    #[serde(default)]
    pub executable: Option<Executable>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub why: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Executable {
    pub number: u32,
}

/// Build state from `/job/{name}/{number}/api/json`
#[derive(Debug, Clone, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub number: Option<u32>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// CSRF crumb issued by `/crumbIssuer/api/json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrumbInfo {
    #[serde(rename = "crumbRequestField")]
    pub field: String,
    pub crumb: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_parameterized_jobs() {
        let raw = r#"{
            "property": [
                {"_class": "hudson.model.ParametersDefinitionProperty"},
                {"_class": "some.other.Property"}
            ]
        }"#;
        let info: JobInfo = serde_json::from_str(raw).unwrap();
        assert!(info.is_parameterized());

        let plain: JobInfo = serde_json::from_str(r#"{"property": []}"#).unwrap();
        assert!(!plain.is_parameterized());
    }

    #[test]
    fn queue_item_states() {
        let pending: QueueItemInfo =
            serde_json::from_str(r#"{"why": "waiting for executor"}"#).unwrap();
        assert!(pending.executable.is_none());
        assert!(!pending.cancelled);

        let scheduled: QueueItemInfo =
            serde_json::from_str(r#"{"executable": {"number": 42}}"#).unwrap();
        assert_eq!(scheduled.executable.unwrap().number, 42);

        let cancelled: QueueItemInfo = serde_json::from_str(r#"{"cancelled": true}"#).unwrap();
        assert!(cancelled.cancelled);
    }
}
