//! Build trigger and polling
//!
//! Drives a triggered build from queue item to terminal status under a
//! bounded polling policy. Queue resolution is attempt-counted, build
//! completion is deadline-based, and a transport hiccup during a poll
//! consumes the attempt instead of aborting the wait.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use helmsman_client::{BuildServerClient, ClientError};
use helmsman_core::domain::build::{Build, BuildStatus, QueuedItem};
use helmsman_core::dto::build::QueueItemInfo;

/// How many characters of console output to keep when excerpting a log
pub const CONSOLE_TAIL_CHARS: usize = 1000;

/// Timing bounds for queue and build polling
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub queue_max_attempts: u32,
    pub queue_interval: Duration,
    pub build_timeout: Duration,
    pub build_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            queue_max_attempts: 10,
            queue_interval: Duration::from_secs(2),
            build_timeout: Duration::from_secs(600),
            build_interval: Duration::from_secs(10),
        }
    }
}

/// Errors from triggering or waiting on a build
#[derive(Debug, Error)]
pub enum PollError {
    #[error("build trigger failed: {0}")]
    TriggerFailed(String),

    /// The build server dropped the queued item before scheduling it
    #[error("queued build was cancelled by the build server")]
    Cancelled,

    /// The queue item never produced a build number
    #[error("queued build did not schedule within {attempts} poll(s)")]
    QueueTimeout { attempts: u32 },

    /// The build was still running when the deadline passed
    #[error("build did not finish within {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Build server operations the poller needs
#[async_trait]
pub trait BuildBackend: Send + Sync {
    async fn trigger(
        &self,
        job: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<QueuedItem, ClientError>;

    async fn queue_item(&self, item: &QueuedItem) -> Result<QueueItemInfo, ClientError>;

    async fn build_status(&self, job: &str, number: u32) -> Result<BuildStatus, ClientError>;

    async fn console_log(&self, job: &str, number: u32) -> Result<String, ClientError>;

    async fn stop_build(&self, job: &str, number: u32) -> Result<bool, ClientError>;
}

#[async_trait]
impl BuildBackend for BuildServerClient {
    async fn trigger(
        &self,
        job: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<QueuedItem, ClientError> {
        BuildServerClient::trigger(self, job, params).await
    }

    async fn queue_item(&self, item: &QueuedItem) -> Result<QueueItemInfo, ClientError> {
        BuildServerClient::queue_item(self, item).await
    }

    async fn build_status(&self, job: &str, number: u32) -> Result<BuildStatus, ClientError> {
        BuildServerClient::build_status(self, job, number).await
    }

    async fn console_log(&self, job: &str, number: u32) -> Result<String, ClientError> {
        BuildServerClient::console_log(self, job, number).await
    }

    async fn stop_build(&self, job: &str, number: u32) -> Result<bool, ClientError> {
        BuildServerClient::stop_build(self, job, number).await
    }
}

/// Triggers builds and waits them out under the polling policy
#[derive(Clone)]
pub struct BuildPoller {
    backend: Arc<dyn BuildBackend>,
    policy: PollPolicy,
}

impl BuildPoller {
    pub fn new(backend: Arc<dyn BuildBackend>, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    /// Triggers the job and returns its queue item
    pub async fn trigger(
        &self,
        job: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<QueuedItem, PollError> {
        self.backend
            .trigger(job, params)
            .await
            .map_err(|e| PollError::TriggerFailed(e.to_string()))
    }

    /// Polls the queue item until it schedules into a numbered build
    ///
    /// Each poll consumes one attempt, including polls that fail at the
    /// transport level. A cancelled item fails immediately.
    pub async fn resolve(&self, job: &str, item: &QueuedItem) -> Result<Build, PollError> {
        let attempts = self.policy.queue_max_attempts;

        for attempt in 1..=attempts {
            match self.backend.queue_item(item).await {
                Ok(info) => {
                    if let Some(executable) = info.executable {
                        info!("Build #{} scheduled for job '{}'", executable.number, job);
                        return Ok(Build::new(job, executable.number));
                    }
                    if info.cancelled {
                        return Err(PollError::Cancelled);
                    }
                    debug!(
                        "Queue poll {}/{}: still waiting ({})",
                        attempt,
                        attempts,
                        info.why.as_deref().unwrap_or("no reason given")
                    );
                }
                Err(e) => {
                    warn!("Queue poll {}/{} failed: {}", attempt, attempts, e);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.policy.queue_interval).await;
            }
        }

        Err(PollError::QueueTimeout { attempts })
    }

    /// Waits for the build to reach a terminal status
    ///
    /// The terminal status is returned verbatim; deciding whether a
    /// FAILURE fails the pipeline is the caller's business. Transport
    /// errors during a poll are logged and retried until the deadline.
    pub async fn await_completion(&self, build: &Build) -> Result<BuildStatus, PollError> {
        let deadline = tokio::time::Instant::now() + self.policy.build_timeout;

        loop {
            match self.backend.build_status(&build.job, build.number).await {
                Ok(status) if status.is_terminal() => {
                    info!("Build #{} finished: {}", build.number, status);
                    return Ok(status);
                }
                Ok(_) => debug!("Build #{} still running", build.number),
                Err(e) => warn!("Build status poll failed: {}", e),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(PollError::Timeout {
                    timeout: self.policy.build_timeout,
                });
            }
            tokio::time::sleep(self.policy.build_interval).await;
        }
    }

    /// Fetches the tail of the build's console output, if reachable
    pub async fn console_tail(&self, build: &Build) -> Option<String> {
        match self.backend.console_log(&build.job, build.number).await {
            Ok(log) => Some(tail_chars(&log, CONSOLE_TAIL_CHARS)),
            Err(e) => {
                warn!("Could not fetch console log for #{}: {}", build.number, e);
                None
            }
        }
    }

    /// Asks the server to abort the build
    pub async fn abort(&self, build: &Build) -> bool {
        match self.backend.stop_build(&build.job, build.number).await {
            Ok(stopped) => stopped,
            Err(e) => {
                warn!("Could not stop build #{}: {}", build.number, e);
                false
            }
        }
    }
}

/// Last `max` characters of `text`, respecting char boundaries
fn tail_chars(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
