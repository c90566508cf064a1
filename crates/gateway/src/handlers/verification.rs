//! `verification.*` procedures: email and SMS codes

use axum::{extract::State, Json};
use tutorly_common::{
    auth::AuthContext,
    db::repositories::Channel,
    errors::Result,
    schemas::{PhoneInput, VerifyCodeInput},
    services::CodeSent,
};

use super::{Ack, Input};
use crate::AppState;

pub async fn send_email_code(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<CodeSent>> {
    let user_id = auth.require_user()?;
    state.verification.send_email_code(user_id).await.map(Json)
}

pub async fn send_sms_code(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<PhoneInput>,
) -> Result<Json<CodeSent>> {
    let user_id = auth.require_user()?;
    state.verification.send_sms_code(user_id, input.phone).await.map(Json)
}

pub async fn verify_email(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<VerifyCodeInput>,
) -> Result<Json<Ack>> {
    let user_id = auth.require_user()?;
    state.verification.verify(user_id, Channel::Email, &input.code).await?;
    Ok(Ack::ok())
}

pub async fn verify_sms(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<VerifyCodeInput>,
) -> Result<Json<Ack>> {
    let user_id = auth.require_user()?;
    state.verification.verify(user_id, Channel::Sms, &input.code).await?;
    Ok(Ack::ok())
}
