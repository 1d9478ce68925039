//! Notification channels
//!
//! Each channel renders the shared event data into its own shape and
//! performs exactly one outbound send. Channels are isolated: an error is
//! returned to the dispatcher and lands in that channel's outcome slot,
//! nothing more.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::NotifyError;
use crate::template;
use helmsman_core::domain::notification::NotificationEvent;

const DEFAULT_CHAT_TEMPLATE: &str = "\
:rocket: *Deployment notification*
*Project*: ${project_name}
*Environment*: ${environment}
*Status*: ${status}
*Version*: ${version}
*Time*: ${timestamp}
${details}";

const DEFAULT_MSG_TEMPLATE: &str = "\
[Deployment notification]
Project: ${project_name}
Environment: ${environment}
Status: ${status}
Version: ${version}
Time: ${timestamp}
${details}";

const DEFAULT_EMAIL_SUBJECT: &str = "Deployment notification - ${project_name}";

const DEFAULT_EMAIL_BODY: &str = "\
<html>
<body>
  <h2>Deployment notification</h2>
  <p><strong>Project:</strong> ${project_name}</p>
  <p><strong>Environment:</strong> ${environment}</p>
  <p><strong>Status:</strong> ${status}</p>
  <p><strong>Version:</strong> ${version}</p>
  <p><strong>Time:</strong> ${timestamp}</p>
  <pre>${details}</pre>
  <p><small>Sent by the automated change pipeline; do not reply.</small></p>
</body>
</html>";

/// One outbound notification target
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Configuration name of the channel (e.g. "chat", "email")
    fn name(&self) -> &str;

    /// Performs one send attempt for the event
    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// Webhook channel posting a `{"text": ...}` body (Slack-shaped)
pub struct ChatWebhookChannel {
    name: String,
    webhook_url: String,
    template: String,
    client: Client,
}

impl ChatWebhookChannel {
    pub fn new(name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            webhook_url: webhook_url.into(),
            template: DEFAULT_CHAT_TEMPLATE.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }
}

#[async_trait]
impl NotificationChannel for ChatWebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let message = template::fill(&self.template, &event.template_data());
        let payload = json!({ "text": message });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                channel: self.name.clone(),
                reason: format!("webhook answered {}", status),
            });
        }

        debug!("Channel '{}' delivered", self.name);
        Ok(())
    }
}

/// Application-level acknowledgment of a msgtype-style webhook
#[derive(Debug, Deserialize)]
struct MsgWebhookAck {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
}

/// Webhook channel posting a `{"msgtype": "text", ...}` body (WeCom-shaped)
///
/// Delivery requires both an HTTP 2xx and an application `errcode` of 0.
pub struct MsgWebhookChannel {
    name: String,
    webhook_url: String,
    template: String,
    client: Client,
}

impl MsgWebhookChannel {
    pub fn new(name: impl Into<String>, webhook_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            webhook_url: webhook_url.into(),
            template: DEFAULT_MSG_TEMPLATE.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }
}

#[async_trait]
impl NotificationChannel for MsgWebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        let message = template::fill(&self.template, &event.template_data());
        let payload = json!({
            "msgtype": "text",
            "text": { "content": message }
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                channel: self.name.clone(),
                reason: format!("webhook answered {}", status),
            });
        }

        let ack: MsgWebhookAck = response
            .json()
            .await
            .map_err(|e| NotifyError::Rejected {
                channel: self.name.clone(),
                reason: format!("unreadable acknowledgment: {}", e),
            })?;

        if ack.errcode != 0 {
            return Err(NotifyError::Rejected {
                channel: self.name.clone(),
                reason: ack
                    .errmsg
                    .unwrap_or_else(|| format!("errcode {}", ack.errcode)),
            });
        }

        debug!("Channel '{}' delivered", self.name);
        Ok(())
    }
}

/// SMTP configuration for the email channel
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub recipients: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

/// Email channel sending an HTML body over authenticated SMTP (STARTTLS)
pub struct EmailChannel {
    name: String,
    settings: EmailSettings,
    subject_template: String,
    body_template: String,
}

impl EmailChannel {
    pub fn new(name: impl Into<String>, settings: EmailSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            subject_template: DEFAULT_EMAIL_SUBJECT.to_string(),
            body_template: DEFAULT_EMAIL_BODY.to_string(),
        }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        if self.settings.recipients.is_empty() {
            return Err(NotifyError::Misconfigured {
                channel: self.name.clone(),
                reason: "no recipients configured".to_string(),
            });
        }

        let data = event.template_data();
        let subject = template::fill(&self.subject_template, &data);
        let body = template::fill(&self.body_template, &data);

        let mut builder = Message::builder()
            .from(self.settings.username.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML);
        for recipient in &self.settings.recipients {
            builder = builder.to(recipient.parse()?);
        }
        let message = builder.body(body)?;

        let transport: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.smtp_server)?
                .port(self.settings.smtp_port)
                .credentials(Credentials::new(
                    self.settings.username.clone(),
                    self.settings.password.clone(),
                ))
                .build();

        transport.send(message).await?;

        debug!("Channel '{}' delivered", self.name);
        Ok(())
    }
}
