//! SMS delivery

use super::{http_client, with_retry};
use crate::config::SmsConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

const SMS_RETRIES: u32 = 2;

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send `body` to an E.164 number
    async fn send(&self, to: &str, body: &str) -> Result<()>;
}

/// Pick the gateway named by `sms.provider`
pub fn sms_gateway_from_config(config: &SmsConfig) -> Result<Arc<dyn SmsGateway>> {
    match config.provider.as_str() {
        "log" => Ok(Arc::new(LogSmsGateway)),
        "http" => Ok(Arc::new(HttpSmsGateway::new(config)?)),
        other => Err(AppError::Configuration {
            message: format!("Unknown SMS provider '{}'", other),
        }),
    }
}

/// JSON-over-HTTP SMS provider
pub struct HttpSmsGateway {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

#[derive(Serialize)]
struct SmsRequest<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
}

impl HttpSmsGateway {
    pub fn new(config: &SmsConfig) -> Result<Self> {
        let api_url = config.api_url.clone().ok_or_else(|| AppError::Configuration {
            message: "sms.api_url is required for the http provider".to_string(),
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "sms.api_key is required for the http provider".to_string(),
        })?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_url,
            api_key,
            sender: config.sender.clone(),
        })
    }

    async fn post(&self, to: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&SmsRequest {
                from: &self.sender,
                to,
                text: body,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(AppError::unavailable("sms", format!("{} {}", status, detail)))
        } else {
            Err(AppError::Validation {
                message: format!("SMS provider rejected the message: {} {}", status, detail),
                field: Some("phone".to_string()),
            })
        }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        with_retry("sms", SMS_RETRIES, || self.post(to, body)).await?;
        crate::metrics::record_message_sent("sms");
        Ok(())
    }
}

/// Development gateway: writes the message to the log
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        info!(to, body, "SMS (log provider)");
        Ok(())
    }
}
