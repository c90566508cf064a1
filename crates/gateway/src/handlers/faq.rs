//! `faq.*` procedures

use axum::{extract::State, Json};
use tutorly_common::{
    db::models::Faq, db::repositories::FaqRepository, errors::Result, schemas::FaqQuery,
};

use super::Input;
use crate::AppState;

/// Published entries for one audience; readable without an account
pub async fn list(
    State(state): State<AppState>,
    Input(query): Input<FaqQuery>,
) -> Result<Json<Vec<Faq>>> {
    FaqRepository::list_for(state.db.read(), query.audience)
        .await
        .map(Json)
}
