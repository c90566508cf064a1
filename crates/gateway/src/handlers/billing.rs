//! `billing.*` procedures: plans, promo codes, subscriptions

use axum::{extract::State, Json};
use tutorly_common::{
    auth::AuthContext,
    db::models::{Invoice, Payment, Subscription, SubscriptionPlan},
    db::repositories::BillingRepository,
    errors::Result,
    schemas::{CheckoutInput, PromoCheckInput},
    services::{CheckoutSession, PromoPreview},
};

use super::Input;
use crate::AppState;

/// Active plans; public so pricing pages can render signed out
pub async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<SubscriptionPlan>>> {
    state.billing.list_plans().await.map(Json)
}

pub async fn check_promo_code(
    State(state): State<AppState>,
    _auth: AuthContext,
    Input(input): Input<PromoCheckInput>,
) -> Result<Json<PromoPreview>> {
    state.billing.preview_promo(&input.code).await.map(Json)
}

pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<CheckoutInput>,
) -> Result<Json<CheckoutSession>> {
    let user_id = auth.require_user()?;
    state.billing.checkout(user_id, input).await.map(Json)
}

pub async fn cancel(State(state): State<AppState>, auth: AuthContext) -> Result<Json<Subscription>> {
    let user_id = auth.require_user()?;
    state.billing.cancel(user_id).await.map(Json)
}

/// The live subscription, or `null`
pub async fn subscription(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Option<Subscription>>> {
    let user_id = auth.require_user()?;
    BillingRepository::find_live_subscription(state.db.read(), user_id)
        .await
        .map(Json)
}

pub async fn payments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Payment>>> {
    let user_id = auth.require_user()?;
    BillingRepository::list_payments(state.db.read(), user_id)
        .await
        .map(Json)
}

pub async fn invoices(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Invoice>>> {
    let user_id = auth.require_user()?;
    BillingRepository::list_invoices(state.db.read(), user_id)
        .await
        .map(Json)
}
