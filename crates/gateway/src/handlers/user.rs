//! `user.*` procedures: the signed-in student or parent

use axum::{extract::State, Json};
use serde::Serialize;
use tutorly_common::{
    auth::AuthContext,
    db::models::{SheetUnlock, User},
    db::repositories::{CatalogRepository, ProfileChanges, TokenBalanceRepository, UserRepository},
    errors::Result,
    schemas::UpdateProfileInput,
};
use tracing::info;

use super::{Ack, Input};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: User,
    pub token_balance: i64,
}

pub async fn me(State(state): State<AppState>, auth: AuthContext) -> Result<Json<MeResponse>> {
    let user_id = auth.require_user()?;
    let user = UserRepository::get(state.db.read(), user_id).await?;
    let token_balance = TokenBalanceRepository::get(state.db.read(), user_id).await?;
    Ok(Json(MeResponse { user, token_balance }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<UpdateProfileInput>,
) -> Result<Json<User>> {
    let user_id = auth.require_user()?;
    let user = UserRepository::get(state.db.read(), user_id).await?;
    let changes = ProfileChanges {
        first_name: input.first_name,
        last_name: input.last_name,
        school_level: input.school_level,
    };
    UserRepository::update_profile(state.db.write(), user, changes)
        .await
        .map(Json)
}

pub async fn complete_onboarding(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<User>> {
    let user_id = auth.require_user()?;
    let user = UserRepository::get(state.db.read(), user_id).await?;
    UserRepository::complete_onboarding(state.db.write(), user)
        .await
        .map(Json)
}

/// Sheets the user has paid for, newest first
pub async fn unlocks(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<SheetUnlock>>> {
    let user_id = auth.require_user()?;
    CatalogRepository::list_unlocks(state.db.read(), user_id)
        .await
        .map(Json)
}

pub async fn delete_account(State(state): State<AppState>, auth: AuthContext) -> Result<Json<Ack>> {
    let user_id = auth.require_user()?;
    UserRepository::delete(state.db.write(), user_id).await?;
    info!(%user_id, "Account deleted");
    Ok(Ack::ok())
}
