//! Helmsman Notification Fan-out
//!
//! Sends one logical deployment event to N independent channels and
//! aggregates the per-channel outcomes. Channel sends run concurrently,
//! each result lands in exactly one outcome slot, and no channel error
//! escapes the dispatcher boundary.

mod channels;
pub mod template;

pub use channels::{
    ChatWebhookChannel, EmailChannel, EmailSettings, MsgWebhookChannel, NotificationChannel,
};

use futures::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use helmsman_core::domain::notification::{NotificationEvent, NotificationOutcome};

/// Errors a channel can report for a single send attempt
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Webhook transport failure
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The receiving service refused the notification
    #[error("channel '{channel}' rejected the notification: {reason}")]
    Rejected { channel: String, reason: String },

    /// Channel configuration is unusable
    #[error("channel '{channel}' is misconfigured: {reason}")]
    Misconfigured { channel: String, reason: String },

    /// SMTP transport failure
    #[error("SMTP send failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Message assembly failure
    #[error("email message invalid: {0}")]
    Message(#[from] lettre::error::Error),

    /// Bad sender or recipient address
    #[error("email address invalid: {0}")]
    Address(#[from] lettre::address::AddressError),
}

/// Fan-out dispatcher over the configured channels
pub struct NotificationDispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Names of every configured channel
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Sends the event to the selected channels and aggregates results
    ///
    /// With no selection every configured channel is targeted. A selected
    /// channel that is not configured yields a `false` slot with a logged
    /// warning. Sends run concurrently; a channel failure never prevents
    /// the other attempts.
    pub async fn dispatch(
        &self,
        event: &NotificationEvent,
        only: Option<&[String]>,
    ) -> NotificationOutcome {
        let targets: Vec<String> = match only {
            Some(names) => names.to_vec(),
            None => self.channels.iter().map(|c| c.name().to_string()).collect(),
        };

        let mut outcome = NotificationOutcome::new();
        let mut sends = Vec::new();

        for name in targets {
            match self.channels.iter().find(|c| c.name() == name) {
                Some(channel) => {
                    sends.push(async move { (name, channel.send(event).await) });
                }
                None => {
                    warn!("Notification channel '{}' is not configured", name);
                    outcome.record(name, false);
                }
            }
        }

        for (name, result) in join_all(sends).await {
            match result {
                Ok(()) => outcome.record(name, true),
                Err(e) => {
                    warn!("Notification channel '{}' failed: {}", name, e);
                    outcome.record(name, false);
                }
            }
        }

        info!(
            "Dispatched notification: {}/{} channel(s) succeeded",
            outcome.succeeded(),
            outcome.attempted()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use helmsman_core::domain::notification::Verdict;

    struct ScriptedChannel {
        name: String,
        succeed: bool,
    }

    #[async_trait]
    impl NotificationChannel for ScriptedChannel {
        fn name(&self) -> &str {
            &self.name
        }

        async fn send(&self, _event: &NotificationEvent) -> Result<(), NotifyError> {
            if self.succeed {
                Ok(())
            } else {
                Err(NotifyError::Rejected {
                    channel: self.name.clone(),
                    reason: "scripted failure".to_string(),
                })
            }
        }
    }

    fn channel(name: &str, succeed: bool) -> Box<dyn NotificationChannel> {
        Box::new(ScriptedChannel {
            name: name.to_string(),
            succeed,
        })
    }

    fn event() -> NotificationEvent {
        NotificationEvent::new("svc", "dev", "success", "all good")
    }

    #[tokio::test]
    async fn two_of_three_is_partial_success_with_exactly_three_slots() {
        let dispatcher = NotificationDispatcher::new(vec![
            channel("chat", true),
            channel("wecom", true),
            channel("email", false),
        ]);

        let outcome = dispatcher.dispatch(&event(), None).await;

        assert_eq!(outcome.attempted(), 3);
        assert_eq!(outcome.succeeded(), 2);
        assert_eq!(outcome.verdict(), Verdict::PartialSuccess);
        assert_eq!(outcome.results()["chat"], true);
        assert_eq!(outcome.results()["wecom"], true);
        assert_eq!(outcome.results()["email"], false);
    }

    #[tokio::test]
    async fn unconfigured_channel_yields_false_not_error() {
        let dispatcher = NotificationDispatcher::new(vec![channel("chat", true)]);
        let selection = vec!["chat".to_string(), "pager".to_string()];

        let outcome = dispatcher.dispatch(&event(), Some(&selection)).await;

        assert_eq!(outcome.attempted(), 2);
        assert_eq!(outcome.results()["pager"], false);
        assert_eq!(outcome.verdict(), Verdict::PartialSuccess);
    }

    #[tokio::test]
    async fn no_selection_targets_every_configured_channel() {
        let dispatcher =
            NotificationDispatcher::new(vec![channel("chat", true), channel("email", true)]);

        let outcome = dispatcher.dispatch(&event(), None).await;

        assert_eq!(outcome.attempted(), 2);
        assert_eq!(outcome.verdict(), Verdict::AllSucceeded);
    }

    #[tokio::test]
    async fn every_channel_failing_is_all_failed() {
        let dispatcher =
            NotificationDispatcher::new(vec![channel("chat", false), channel("email", false)]);

        let outcome = dispatcher.dispatch(&event(), None).await;

        assert_eq!(outcome.verdict(), Verdict::AllFailed);
    }
}
