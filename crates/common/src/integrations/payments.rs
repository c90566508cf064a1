//! Stripe payment gateway

use super::{http_client, with_retry};
use crate::config::StripeConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

const STRIPE_API_VERSION: &str = "2024-06-20";

/// Subscription as returned by the provider after a create or cancel call
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSubscription {
    pub id: String,
    /// Raw provider status (`incomplete`, `active`, ...)
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    /// Secret the front-end needs to confirm the first payment
    pub client_secret: Option<String>,
    pub payment_intent_id: Option<String>,
    pub amount_due: i64,
    pub currency: String,
}

/// Payment provider operations used by billing
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer and return its id
    async fn create_customer(&self, email: &str, name: &str, user_id: Uuid) -> Result<String>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        coupon_id: Option<&str>,
    ) -> Result<CreatedSubscription>;

    /// Cancel at the end of the current period
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<CreatedSubscription>;

    /// One-off percentage coupon applied to the first invoice
    async fn create_coupon(&self, percent_off: i32) -> Result<String>;
}

/// Stripe REST client (form-encoded requests, bearer secret key)
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: Option<String>,
    api_base: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct StripeId {
    id: String,
}

#[derive(Deserialize)]
struct StripeSubscription {
    id: String,
    status: String,
    current_period_end: Option<i64>,
    #[serde(default)]
    cancel_at_period_end: bool,
    latest_invoice: Option<StripeLatestInvoice>,
}

#[derive(Deserialize)]
struct StripeLatestInvoice {
    #[serde(default)]
    amount_due: i64,
    #[serde(default)]
    currency: String,
    payment_intent: Option<StripePaymentIntent>,
}

#[derive(Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl From<StripeSubscription> for CreatedSubscription {
    fn from(sub: StripeSubscription) -> Self {
        let invoice = sub.latest_invoice;
        let intent = invoice.as_ref().and_then(|i| i.payment_intent.as_ref());

        Self {
            current_period_end: sub
                .current_period_end
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            cancel_at_period_end: sub.cancel_at_period_end,
            client_secret: intent.and_then(|pi| pi.client_secret.clone()),
            payment_intent_id: intent.map(|pi| pi.id.clone()),
            amount_due: invoice.as_ref().map(|i| i.amount_due).unwrap_or(0),
            currency: invoice.map(|i| i.currency).unwrap_or_default(),
            id: sub.id,
            status: sub.status,
        }
    }
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, params: Vec<(String, String)>) -> Result<T> {
        let key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::unavailable("stripe", "Stripe secret key is not configured"))?;
        let url = format!("{}/{}", self.api_base, path);
        // Same key on every retry so Stripe applies the request once
        let idempotency_key = Uuid::new_v4().to_string();

        with_retry("stripe", self.max_retries, || {
            self.send_form(&url, key, &idempotency_key, &params)
        })
        .await
    }

    async fn send_form<T: DeserializeOwned>(
        &self,
        url: &str,
        key: &str,
        idempotency_key: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        debug!(url, "Stripe request");

        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .header("Idempotency-Key", idempotency_key)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| AppError::PaymentProvider {
                message: format!("Unexpected Stripe response: {}", e),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<StripeErrorBody>(&body)
            .ok()
            .map(|b| b.error)
            .map(|e| format!("{}: {}", e.kind.unwrap_or_default(), e.message.unwrap_or_default()))
            .unwrap_or(body);

        if status.is_server_error() || status.as_u16() == 429 {
            Err(AppError::unavailable("stripe", format!("{} {}", status, detail)))
        } else {
            Err(AppError::PaymentProvider { message: detail })
        }
    }
}

fn param(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_customer(&self, email: &str, name: &str, user_id: Uuid) -> Result<String> {
        let customer: StripeId = self
            .post_form(
                "customers",
                vec![
                    param("email", email),
                    param("name", name),
                    param("metadata[user_id]", user_id),
                ],
            )
            .await?;

        info!(customer_id = %customer.id, %user_id, "Stripe customer created");
        Ok(customer.id)
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        coupon_id: Option<&str>,
    ) -> Result<CreatedSubscription> {
        let mut params = vec![
            param("customer", customer_id),
            param("items[0][price]", price_id),
            param("payment_behavior", "default_incomplete"),
            param("expand[]", "latest_invoice.payment_intent"),
        ];
        if let Some(coupon) = coupon_id {
            params.push(param("discounts[0][coupon]", coupon));
        }

        let subscription: StripeSubscription = self.post_form("subscriptions", params).await?;
        info!(subscription_id = %subscription.id, status = %subscription.status, "Stripe subscription created");
        Ok(subscription.into())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<CreatedSubscription> {
        let subscription: StripeSubscription = self
            .post_form(
                &format!("subscriptions/{}", subscription_id),
                vec![param("cancel_at_period_end", "true")],
            )
            .await?;
        Ok(subscription.into())
    }

    async fn create_coupon(&self, percent_off: i32) -> Result<String> {
        let coupon: StripeId = self
            .post_form(
                "coupons",
                vec![param("percent_off", percent_off), param("duration", "once")],
            )
            .await?;
        Ok(coupon.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_conversion() {
        let raw: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "status": "incomplete",
            "current_period_end": 1_700_000_000,
            "latest_invoice": {
                "amount_due": 990,
                "currency": "eur",
                "payment_intent": { "id": "pi_1", "client_secret": "pi_1_secret" }
            }
        }))
        .unwrap();

        let sub = CreatedSubscription::from(raw);
        assert_eq!(sub.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(sub.client_secret.as_deref(), Some("pi_1_secret"));
        assert_eq!(sub.amount_due, 990);
        assert_eq!(sub.current_period_end.map(|d| d.timestamp()), Some(1_700_000_000));
        assert!(!sub.cancel_at_period_end);
    }

    #[tokio::test]
    async fn test_missing_secret_key_is_unavailable() {
        let client = StripeClient::new(&StripeConfig::default()).unwrap();
        let err = client.create_coupon(10).await.unwrap_err();
        assert!(matches!(err, AppError::ExternalServiceUnavailable { .. }));
    }
}
