//! Stripe webhook verification and event payloads
//!
//! The `Stripe-Signature` header has the form `t=<unix>,v1=<hex>[,v1=...]`.
//! The signature is HMAC-SHA256 over `"{t}.{raw body}"` keyed with the
//! endpoint secret.

use crate::errors::{AppError, Result};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Check the signature header against the raw payload.
///
/// `now` is the current unix time; signatures older or newer than
/// `tolerance_secs` are rejected.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let raw_timestamp = timestamp.ok_or(AppError::InvalidWebhookSignature)?;
    let timestamp: i64 = raw_timestamp
        .parse()
        .map_err(|_| AppError::InvalidWebhookSignature)?;
    if signatures.is_empty() || now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(AppError::InvalidWebhookSignature);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::Configuration {
        message: format!("Invalid webhook secret: {}", e),
    })?;
    mac.update(raw_timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());

    if matched {
        Ok(())
    } else {
        Err(AppError::InvalidWebhookSignature)
    }
}

/// Build a `Stripe-Signature` header for `payload`
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| AppError::Configuration {
        message: format!("Invalid webhook secret: {}", e),
    })?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

/// Envelope of every webhook delivery
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| AppError::InvalidFormat {
            message: format!("Malformed webhook event: {}", e),
        })
    }

    /// Decode `data.object` into one of the typed payloads below
    pub fn object<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| AppError::InvalidFormat {
            message: format!("Unexpected {} payload: {}", self.event_type, e),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default)]
    pub currency: String,
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub lines: InvoiceLines,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceLines {
    #[serde(default)]
    pub data: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLine {
    pub price: Option<PriceRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRef {
    pub id: String,
}

impl InvoiceObject {
    /// Price of the first line item
    pub fn price_id(&self) -> Option<&str> {
        self.lines
            .data
            .iter()
            .find_map(|line| line.price.as_ref())
            .map(|price| price.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: Option<String>,
    pub status: String,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: PriceRef,
}

impl SubscriptionObject {
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntentObject {
    pub id: String,
    pub customer: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = signature_header(payload, SECRET, NOW).unwrap();
        assert!(verify_signature(payload, &header, SECRET, 300, NOW + 10).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = signature_header(br#"{"amount":100}"#, SECRET, NOW).unwrap();
        let err = verify_signature(br#"{"amount":999}"#, &header, SECRET, 300, NOW).unwrap_err();
        assert!(matches!(err, AppError::InvalidWebhookSignature));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = b"{}";
        let header = signature_header(payload, SECRET, NOW).unwrap();
        assert!(verify_signature(payload, &header, SECRET, 300, NOW + 301).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = b"{}";
        let header = signature_header(payload, "whsec_other", NOW).unwrap();
        assert!(verify_signature(payload, &header, SECRET, 300, NOW).is_err());
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let payload = b"{}";
        let good = signature_header(payload, SECRET, NOW).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1=deadbeef,v0=ignored,v1={}", NOW, good_sig);
        assert!(verify_signature(payload, &header, SECRET, 300, NOW).is_ok());
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(verify_signature(b"{}", "garbage", SECRET, 300, NOW).is_err());
        assert!(verify_signature(b"{}", "t=abc,v1=00", SECRET, 300, NOW).is_err());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1=00", t);
            let err = verify_signature(b"{}", &header, SECRET, 300, NOW).unwrap_err();
            assert!(matches!(err, AppError::InvalidWebhookSignature));
        }
    }

    #[test]
    fn test_parse_invoice_event() {
        let payload = serde_json::json!({
            "id": "evt_1",
            "type": "invoice.paid",
            "created": NOW,
            "data": { "object": {
                "id": "in_1",
                "customer": "cus_1",
                "subscription": "sub_1",
                "amount_paid": 990,
                "currency": "eur",
                "lines": { "data": [ { "price": { "id": "price_monthly" } } ] }
            }}
        });
        let event = WebhookEvent::parse(payload.to_string().as_bytes()).unwrap();
        assert_eq!(event.event_type, "invoice.paid");

        let invoice: InvoiceObject = event.object().unwrap();
        assert_eq!(invoice.amount_paid, 990);
        assert_eq!(invoice.price_id(), Some("price_monthly"));
    }
}
