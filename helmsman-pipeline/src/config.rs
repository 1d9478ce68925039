//! Environment-driven configuration
//!
//! Every external endpoint and credential comes from `HELMSMAN_*`
//! variables so the binary can run unmodified across environments.
//! Validation happens up front; optional subsystems (build job,
//! monitoring, individual notification channels) stay optional.

use std::time::Duration;

use thiserror::Error;

use crate::poller::PollPolicy;
use helmsman_notify::EmailSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{variable} is required but not set")]
    Missing { variable: &'static str },

    #[error("{variable} must be an http(s) URL, got '{value}'")]
    NotAUrl { variable: &'static str, value: String },

    #[error("{variable} must be a positive integer, got '{value}'")]
    NotANumber { variable: &'static str, value: String },
}

/// Full runtime configuration of the pipeline
#[derive(Debug, Clone)]
pub struct Config {
    pub analyzer_url: String,
    pub analyzer_api_key: String,

    pub build_url: String,
    pub build_user: String,
    pub build_token: String,

    pub monitor_url: String,
    pub monitor_api_key: String,

    pub git_username: String,
    pub git_token: String,
    pub default_branch: String,

    pub environment: String,
    pub poll: PollPolicy,

    pub chat_webhook: Option<String>,
    pub msg_webhook: Option<String>,
    pub email: Option<EmailSettings>,
}

impl Config {
    /// Reads the configuration from `HELMSMAN_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut poll = PollPolicy::default();
        if let Some(n) = read_u64("HELMSMAN_QUEUE_MAX_ATTEMPTS")? {
            poll.queue_max_attempts = n as u32;
        }
        if let Some(n) = read_u64("HELMSMAN_QUEUE_INTERVAL_SECS")? {
            poll.queue_interval = Duration::from_secs(n);
        }
        if let Some(n) = read_u64("HELMSMAN_BUILD_TIMEOUT_SECS")? {
            poll.build_timeout = Duration::from_secs(n);
        }
        if let Some(n) = read_u64("HELMSMAN_BUILD_INTERVAL_SECS")? {
            poll.build_interval = Duration::from_secs(n);
        }

        let config = Self {
            analyzer_url: require_url("HELMSMAN_ANALYZER_URL")?,
            analyzer_api_key: require("HELMSMAN_ANALYZER_API_KEY")?,
            build_url: read("HELMSMAN_BUILD_URL").unwrap_or_default(),
            build_user: read("HELMSMAN_BUILD_USER").unwrap_or_default(),
            build_token: read("HELMSMAN_BUILD_TOKEN").unwrap_or_default(),
            monitor_url: read("HELMSMAN_MONITOR_URL").unwrap_or_default(),
            monitor_api_key: read("HELMSMAN_MONITOR_API_KEY").unwrap_or_default(),
            git_username: read("HELMSMAN_GIT_USERNAME").unwrap_or_default(),
            git_token: read("HELMSMAN_GIT_TOKEN").unwrap_or_default(),
            default_branch: read("HELMSMAN_DEFAULT_BRANCH")
                .unwrap_or_else(|| "main".to_string()),
            environment: read("HELMSMAN_ENVIRONMENT").unwrap_or_else(|| "dev".to_string()),
            poll,
            chat_webhook: read("HELMSMAN_CHAT_WEBHOOK"),
            msg_webhook: read("HELMSMAN_MSG_WEBHOOK"),
            email: email_from_env(),
        };
        Ok(config)
    }

    /// Whether the build server connection is configured
    pub fn has_build_server(&self) -> bool {
        !self.build_url.is_empty()
    }

    /// Whether the monitoring backend is configured
    pub fn has_monitor(&self) -> bool {
        !self.monitor_url.is_empty()
    }
}

fn read(variable: &'static str) -> Option<String> {
    std::env::var(variable).ok().filter(|v| !v.is_empty())
}

fn require(variable: &'static str) -> Result<String, ConfigError> {
    read(variable).ok_or(ConfigError::Missing { variable })
}

fn require_url(variable: &'static str) -> Result<String, ConfigError> {
    let value = require(variable)?;
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::NotAUrl { variable, value });
    }
    Ok(value)
}

fn read_u64(variable: &'static str) -> Result<Option<u64>, ConfigError> {
    match read(variable) {
        None => Ok(None),
        Some(value) => match value.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::NotANumber { variable, value }),
        },
    }
}

fn email_from_env() -> Option<EmailSettings> {
    let smtp_server = read("HELMSMAN_SMTP_SERVER")?;
    let username = read("HELMSMAN_SMTP_USERNAME")?;
    let password = read("HELMSMAN_SMTP_PASSWORD")?;
    let smtp_port = read("HELMSMAN_SMTP_PORT")
        .and_then(|v| v.parse().ok())
        .unwrap_or(587);
    let recipients = read("HELMSMAN_SMTP_RECIPIENTS")
        .map(|v| {
            v.split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(EmailSettings {
        smtp_server,
        smtp_port,
        username,
        password,
        recipients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; each test uses its own keys.

    #[test]
    fn url_validation_rejects_bare_hosts() {
        let err = ConfigError::NotAUrl {
            variable: "HELMSMAN_ANALYZER_URL",
            value: "analyzer.example.com".to_string(),
        };
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn poll_policy_defaults() {
        let poll = PollPolicy::default();
        assert_eq!(poll.queue_max_attempts, 10);
        assert_eq!(poll.queue_interval, Duration::from_secs(2));
        assert_eq!(poll.build_timeout, Duration::from_secs(600));
        assert_eq!(poll.build_interval, Duration::from_secs(10));
    }

    #[test]
    fn recipient_lists_are_trimmed() {
        unsafe {
            std::env::set_var("HELMSMAN_SMTP_SERVER", "smtp.example.com");
            std::env::set_var("HELMSMAN_SMTP_USERNAME", "bot@example.com");
            std::env::set_var("HELMSMAN_SMTP_PASSWORD", "pw");
            std::env::set_var("HELMSMAN_SMTP_RECIPIENTS", "a@x.com, b@x.com ,,");
        }

        let email = email_from_env().unwrap();
        assert_eq!(email.smtp_port, 587);
        assert_eq!(email.recipients, vec!["a@x.com", "b@x.com"]);

        unsafe {
            std::env::remove_var("HELMSMAN_SMTP_SERVER");
            std::env::remove_var("HELMSMAN_SMTP_USERNAME");
            std::env::remove_var("HELMSMAN_SMTP_PASSWORD");
            std::env::remove_var("HELMSMAN_SMTP_RECIPIENTS");
        }
    }
}
