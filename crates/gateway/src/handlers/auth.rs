//! `auth.*` procedures

use axum::{extract::State, Json};
use tutorly_common::{
    errors::Result,
    schemas::{LoginInput, RegisterInput},
    services::{AuthSession, ProfessorSession},
};

use super::Input;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    Input(input): Input<RegisterInput>,
) -> Result<Json<AuthSession>> {
    state.auth.register(input).await.map(Json)
}

pub async fn login(
    State(state): State<AppState>,
    Input(input): Input<LoginInput>,
) -> Result<Json<AuthSession>> {
    state.auth.login(input).await.map(Json)
}

pub async fn professor_login(
    State(state): State<AppState>,
    Input(input): Input<LoginInput>,
) -> Result<Json<ProfessorSession>> {
    state.auth.professor_login(input).await.map(Json)
}
