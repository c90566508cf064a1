//! `professor.*` procedures: content management
//!
//! Professors edit their own modules; admins edit any module.

use axum::{extract::State, Json};
use tutorly_common::{
    auth::{AuthContext, AuthRole},
    db::models::{Chapter, Module, Professor, Sheet},
    db::repositories::ProfessorRepository,
    errors::Result,
    schemas::{ChapterInput, IdInput, ModuleInput, ModuleUpdateInput, SheetInput, SheetUpdateInput},
    services::Editor,
};

use super::{Ack, Input};
use crate::AppState;

fn editor(auth: &AuthContext) -> Result<Editor> {
    let subject_id = auth.require_professor()?;
    Ok(match auth.role {
        AuthRole::Admin => Editor::Admin,
        _ => Editor::Professor(subject_id),
    })
}

pub async fn me(State(state): State<AppState>, auth: AuthContext) -> Result<Json<Professor>> {
    let professor_id = auth.require_professor()?;
    ProfessorRepository::get(state.db.read(), professor_id)
        .await
        .map(Json)
}

pub async fn my_modules(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Module>>> {
    let professor_id = auth.require_professor()?;
    state.catalog.modules_of(professor_id).await.map(Json)
}

pub async fn create_module(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<ModuleInput>,
) -> Result<Json<Module>> {
    state.catalog.create_module(editor(&auth)?, input).await.map(Json)
}

pub async fn update_module(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<ModuleUpdateInput>,
) -> Result<Json<Module>> {
    state.catalog.update_module(editor(&auth)?, input).await.map(Json)
}

pub async fn delete_module(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<Ack>> {
    state.catalog.delete_module(editor(&auth)?, input.id).await?;
    Ok(Ack::ok())
}

pub async fn create_chapter(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<ChapterInput>,
) -> Result<Json<Chapter>> {
    state.catalog.create_chapter(editor(&auth)?, input).await.map(Json)
}

pub async fn delete_chapter(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<Ack>> {
    state.catalog.delete_chapter(editor(&auth)?, input.id).await?;
    Ok(Ack::ok())
}

pub async fn create_sheet(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<SheetInput>,
) -> Result<Json<Sheet>> {
    state.catalog.create_sheet(editor(&auth)?, input).await.map(Json)
}

pub async fn get_sheet(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<Sheet>> {
    state.catalog.edited_sheet(editor(&auth)?, input.id).await.map(Json)
}

pub async fn update_sheet(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<SheetUpdateInput>,
) -> Result<Json<Sheet>> {
    state.catalog.update_sheet(editor(&auth)?, input).await.map(Json)
}

pub async fn delete_sheet(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<Ack>> {
    state.catalog.delete_sheet(editor(&auth)?, input.id).await?;
    Ok(Ack::ok())
}
