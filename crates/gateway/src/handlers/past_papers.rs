//! `pastPapers.*` procedures

use axum::{extract::State, Json};
use tutorly_common::{
    auth::AuthContext,
    db::models::PastPaper,
    db::repositories::{PastPaperFilter, PastPaperRepository},
    errors::{AppError, Result},
    schemas::{IdInput, PastPaperQuery},
};

use super::Input;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthContext,
    Input(query): Input<PastPaperQuery>,
) -> Result<Json<Vec<PastPaper>>> {
    let filter = PastPaperFilter {
        module_id: query.module_id,
        school_level: query.school_level,
        year: query.year,
    };
    PastPaperRepository::list(state.db.read(), filter)
        .await
        .map(Json)
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<PastPaper>> {
    PastPaperRepository::find_by_id(state.db.read(), input.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("past_paper", input.id))
}
