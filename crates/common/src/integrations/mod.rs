//! Outbound integrations: Stripe, SMS and email providers
//!
//! Each provider sits behind a trait so services hold an `Arc<dyn _>` and
//! tests substitute in-memory fakes. HTTP implementations retry transport
//! failures with exponential backoff.

mod email;
mod payments;
mod sms;
pub mod webhook;

pub use email::{email_sender_from_config, EmailMessage, EmailSender, HttpEmailSender, LogEmailSender};
pub use payments::{CreatedSubscription, PaymentGateway, StripeClient};
pub use sms::{sms_gateway_from_config, HttpSmsGateway, LogSmsGateway, SmsGateway};

use crate::errors::{AppError, Result};
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `op` until it succeeds, fails permanently, or `max_retries` retries are spent.
///
/// Only connection failures, timeouts and 5xx answers (mapped to
/// `ExternalServiceUnavailable`) are retried.
pub(crate) async fn with_retry<T, F, Fut>(service: &'static str, max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(200))
        .with_max_interval(Duration::from_secs(2))
        .with_max_elapsed_time(Some(Duration::from_secs(15)))
        .build();

    let mut attempt = 0u32;
    retry(policy, || {
        attempt += 1;
        let current = attempt;
        let fut = op();
        async move {
            fut.await.map_err(|err| {
                if current <= max_retries && is_transient(&err) {
                    warn!(service, attempt = current, error = %err, "Transient failure, retrying");
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        }
    })
    .await
}

fn is_transient(err: &AppError) -> bool {
    match err {
        AppError::HttpClient(e) => e.is_connect() || e.is_timeout(),
        AppError::ExternalServiceUnavailable { .. } => true,
        _ => false,
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_transient_then_succeed() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::unavailable("test", "down"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("test", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AppError::PaymentProvider {
                    message: "card declined".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(AppError::PaymentProvider { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry("test", 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::unavailable("test", "down")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
