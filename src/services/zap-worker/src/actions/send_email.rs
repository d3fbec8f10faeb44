//! Send-email action over SMTP.
//!
//! Config schema: `{ to (required), subject, body }`. HTML bodies are
//! detected the same way the rest of the platform does it (presence of
//! markup) and sent with the matching content type.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{require_str, ActionError, ActionHandler, ActionResult};
use crate::config::EmailConfig;
use crate::error::{Result, WorkerError};

pub struct SendEmailAction {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_mailbox: Mailbox,
}

impl SendEmailAction {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let from_mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| {
                WorkerError::configuration(format!("Invalid from email address: {}", e))
            })?;

        let mut builder = if config.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host).map_err(|e| {
                WorkerError::configuration(format!("Failed to create SMTP relay: {}", e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        builder = builder.port(config.smtp_port);

        if !config.smtp_username.is_empty() && !config.smtp_password.is_empty() {
            let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());
            builder = builder.credentials(creds);
        }

        builder = builder
            .pool_config(PoolConfig::new().max_size(4))
            .timeout(Some(Duration::from_secs(config.timeout_seconds)));

        Ok(Self {
            transport: builder.build(),
            from_mailbox,
        })
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> ActionResult<Message> {
        let to_mailbox = to
            .parse::<Mailbox>()
            .map_err(|e| ActionError::Config(format!("invalid recipient address '{}': {}", to, e)))?;

        let builder = Message::builder()
            .from(self.from_mailbox.clone())
            .to(to_mailbox)
            .subject(subject);

        let message = if body.contains("<html>") || body.contains("<p>") {
            builder.header(ContentType::TEXT_HTML).body(body.to_string())
        } else {
            builder.header(ContentType::TEXT_PLAIN).body(body.to_string())
        }
        .map_err(|e| ActionError::Config(format!("failed to build email message: {}", e)))?;

        Ok(message)
    }
}

#[async_trait]
impl ActionHandler for SendEmailAction {
    fn kind(&self) -> &'static str {
        "send_email"
    }

    async fn execute(&self, config: &Value, _input: &Value) -> ActionResult<Value> {
        let to = require_str(config, "to")?;
        let subject = config.get("subject").and_then(Value::as_str).unwrap_or("");
        let body = config.get("body").and_then(Value::as_str).unwrap_or("");

        let message = self.build_message(to, subject, body)?;

        debug!(%to, %subject, "Sending email");
        self.transport
            .send(message)
            .await
            .map_err(|e| ActionError::Transient(format!("SMTP send to {} failed: {}", to, e)))?;

        info!(%to, "Email accepted by SMTP relay");
        Ok(json!({"accepted": true, "to": to}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action() -> SendEmailAction {
        SendEmailAction::new(&EmailConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_recipient_is_config_error() {
        let result = action().execute(&json!({"subject": "hi"}), &json!({})).await;
        assert!(matches!(result, Err(ActionError::Config(_))));
    }

    #[tokio::test]
    async fn test_unparseable_recipient_is_config_error() {
        let result = action()
            .execute(&json!({"to": "not an address"}), &json!({}))
            .await;
        assert!(matches!(result, Err(ActionError::Config(_))));
    }

    #[tokio::test]
    async fn test_html_body_gets_html_content_type() {
        let message = action()
            .build_message("user@example.com", "hi", "<p>hello</p>")
            .unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("text/html"));
    }

    #[tokio::test]
    async fn test_plain_body_gets_plain_content_type() {
        let message = action()
            .build_message("user@example.com", "hi", "hello")
            .unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("text/plain"));
    }
}
