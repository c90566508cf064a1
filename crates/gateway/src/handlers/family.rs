//! `family.*` procedures: parents and their children

use axum::{extract::State, Json};
use serde::Serialize;
use tutorly_common::{
    auth::AuthContext,
    db::models::User,
    errors::Result,
    schemas::{ChildInput, LinkChildInput, TransferTokensInput},
    services::ChildSummary,
};

use super::Input;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub parent_balance: i64,
    pub child_balance: i64,
}

pub async fn link_child(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<LinkChildInput>,
) -> Result<Json<User>> {
    let parent_id = auth.require_user()?;
    state.family.link_child(parent_id, &input.child_email).await.map(Json)
}

pub async fn list_children(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<ChildSummary>>> {
    let parent_id = auth.require_user()?;
    state.family.list_children(parent_id).await.map(Json)
}

pub async fn unlink_child(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<ChildInput>,
) -> Result<Json<User>> {
    let parent_id = auth.require_user()?;
    state.family.unlink_child(parent_id, input.child_id).await.map(Json)
}

pub async fn transfer_tokens(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<TransferTokensInput>,
) -> Result<Json<TransferResponse>> {
    let parent_id = auth.require_user()?;
    let (parent_balance, child_balance) = state
        .family
        .transfer_tokens(parent_id, input.child_id, input.amount)
        .await?;
    Ok(Json(TransferResponse {
        parent_balance,
        child_balance,
    }))
}
