//! `catalog.*` procedures: browsing and unlocking sheets

use axum::{extract::State, Json};
use serde::Serialize;
use tutorly_common::{
    auth::AuthContext,
    db::models::{Chapter, Module, Sheet},
    db::repositories::CatalogRepository,
    errors::Result,
    schemas::{IdInput, ModuleQuery},
    services::{SheetSummary, UnlockOutcome},
};

use super::Input;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDetail {
    pub module: Module,
    pub chapters: Vec<Chapter>,
}

pub async fn list_modules(
    State(state): State<AppState>,
    _auth: AuthContext,
    Input(query): Input<ModuleQuery>,
) -> Result<Json<Vec<Module>>> {
    state
        .catalog
        .list_modules(query.school_level.as_deref())
        .await
        .map(Json)
}

pub async fn get_module(
    State(state): State<AppState>,
    _auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<ModuleDetail>> {
    let module = CatalogRepository::get_module(state.db.read(), input.id).await?;
    let chapters = CatalogRepository::list_chapters(state.db.read(), module.id).await?;
    Ok(Json(ModuleDetail { module, chapters }))
}

/// Chapters of the module `id`
pub async fn list_chapters(
    State(state): State<AppState>,
    _auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<Vec<Chapter>>> {
    state.catalog.list_chapters(input.id).await.map(Json)
}

/// Sheets of the chapter `id`, without content
pub async fn list_sheets(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<Vec<SheetSummary>>> {
    let user_id = auth.require_user().ok();
    state.catalog.list_sheets(input.id, user_id).await.map(Json)
}

pub async fn read_sheet(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<Sheet>> {
    let user_id = auth.require_user()?;
    state.catalog.read_sheet(user_id, input.id).await.map(Json)
}

pub async fn unlock_sheet(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<UnlockOutcome>> {
    let user_id = auth.require_user()?;
    state.catalog.unlock_sheet(user_id, input.id).await.map(Json)
}
