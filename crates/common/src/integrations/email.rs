//! Email delivery

use super::{http_client, with_retry};
use crate::config::EmailConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

const EMAIL_RETRIES: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<()>;
}

/// Pick the sender named by `email.provider`
pub fn email_sender_from_config(config: &EmailConfig) -> Result<Arc<dyn EmailSender>> {
    match config.provider.as_str() {
        "log" => Ok(Arc::new(LogEmailSender)),
        "http" => Ok(Arc::new(HttpEmailSender::new(config)?)),
        other => Err(AppError::Configuration {
            message: format!("Unknown email provider '{}'", other),
        }),
    }
}

/// Transactional email API over HTTP
pub struct HttpEmailSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpEmailSender {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let api_url = config.api_url.clone().ok_or_else(|| AppError::Configuration {
            message: "email.api_url is required for the http provider".to_string(),
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "email.api_key is required for the http provider".to_string(),
        })?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_url,
            api_key,
            from: config.from.clone(),
        })
    }

    async fn post(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&EmailRequest {
                from: &self.from,
                to: &message.to,
                subject: &message.subject,
                text: &message.text,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(AppError::unavailable("email", format!("{} {}", status, detail)))
        } else {
            Err(AppError::Internal {
                message: format!("Email provider rejected the message: {} {}", status, detail),
            })
        }
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        with_retry("email", EMAIL_RETRIES, || self.post(&message)).await?;
        crate::metrics::record_message_sent("email");
        Ok(())
    }
}

/// Development sender: writes the message to the log
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        info!(to = %message.to, subject = %message.subject, body = %message.text, "Email (log provider)");
        Ok(())
    }
}
