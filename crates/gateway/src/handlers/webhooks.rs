//! Stripe webhook endpoint
//!
//! The raw body is kept as bytes: the signature covers the exact payload.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use tutorly_common::{errors::Result, services::WebhookOutcome};

use crate::AppState;

pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookOutcome>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok());

    state
        .billing
        .handle_webhook(&body, signature)
        .await
        .map(Json)
}
