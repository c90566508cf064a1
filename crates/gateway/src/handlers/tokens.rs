//! `tokens.*` procedures

use axum::{extract::State, Json};
use serde::Serialize;
use tutorly_common::{auth::AuthContext, db::repositories::TokenBalanceRepository, errors::Result};

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

pub async fn balance(State(state): State<AppState>, auth: AuthContext) -> Result<Json<BalanceResponse>> {
    let user_id = auth.require_user()?;
    let balance = TokenBalanceRepository::get(state.db.read(), user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}
