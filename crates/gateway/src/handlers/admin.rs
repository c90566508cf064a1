//! `admin.*` procedures for the backoffice
//!
//! Every procedure requires an admin token.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;
use tutorly_common::{
    auth::AuthContext,
    db::models::{Faq, PastPaper, Professor, PromotionalCode},
    db::repositories::{
        is_unique_violation, FaqRepository, NewFaq, NewPastPaper, NewPromotionalCode, PastPaperRepository,
        ProfessorRepository, PromotionalCodeRepository, TokenBalanceRepository, UserRepository,
    },
    errors::{AppError, Result},
    metrics,
    schemas::{FaqInput, IdInput, PastPaperInput, ProfessorInput, PromoCodeInput, TokenGrantInput},
};

use super::{Ack, Input};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    pub user_id: uuid::Uuid,
    pub balance: i64,
}

pub async fn create_professor(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<ProfessorInput>,
) -> Result<Json<Professor>> {
    auth.require_admin()?;
    state.auth.create_professor(input).await.map(Json)
}

pub async fn list_professors(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Professor>>> {
    auth.require_admin()?;
    ProfessorRepository::list_active(state.db.read()).await.map(Json)
}

pub async fn create_promo_code(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<PromoCodeInput>,
) -> Result<Json<PromotionalCode>> {
    auth.require_admin()?;
    if input.percent_off.is_none() && input.bonus_tokens == 0 {
        return Err(AppError::Validation {
            message: "A promotional code needs a discount or bonus tokens".to_string(),
            field: Some("percent_off".to_string()),
        });
    }

    let code = input.code.clone();
    let promo = PromotionalCodeRepository::create(
        state.db.write(),
        NewPromotionalCode {
            code: input.code,
            percent_off: input.percent_off,
            bonus_tokens: input.bonus_tokens,
            max_redemptions: input.max_redemptions,
            expires_at: input.expires_at,
        },
    )
    .await
    .map_err(|e| match e {
        AppError::Database(ref db_err) if is_unique_violation(db_err) => AppError::Conflict {
            message: format!("Promotional code {} already exists", code.trim().to_uppercase()),
        },
        other => other,
    })?;

    info!(code = %promo.code, "Promotional code created");
    Ok(Json(promo))
}

pub async fn list_promo_codes(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<PromotionalCode>>> {
    auth.require_admin()?;
    PromotionalCodeRepository::list(state.db.read()).await.map(Json)
}

pub async fn deactivate_promo_code(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<Ack>> {
    auth.require_admin()?;
    if !PromotionalCodeRepository::deactivate(state.db.write(), input.id).await? {
        return Err(AppError::not_found("promotional_code", input.id));
    }
    Ok(Ack::ok())
}

/// Credit tokens to a user, for support gestures
pub async fn grant_tokens(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<TokenGrantInput>,
) -> Result<Json<GrantResponse>> {
    auth.require_admin()?;
    let user = UserRepository::get(state.db.read(), input.user_id).await?;
    let balance = TokenBalanceRepository::credit(state.db.write(), user.id, input.amount).await?;

    metrics::record_tokens_credited(input.amount, "grant");
    info!(user_id = %user.id, amount = input.amount, admin_id = %auth.subject_id, "Tokens granted");
    Ok(Json(GrantResponse {
        user_id: user.id,
        balance,
    }))
}

pub async fn create_faq(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<FaqInput>,
) -> Result<Json<Faq>> {
    auth.require_admin()?;
    FaqRepository::create(
        state.db.write(),
        NewFaq {
            audience: input.audience,
            question: input.question,
            answer: input.answer,
            position: input.position,
            is_published: input.is_published,
        },
    )
    .await
    .map(Json)
}

pub async fn delete_faq(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<IdInput>,
) -> Result<Json<Ack>> {
    auth.require_admin()?;
    if !FaqRepository::delete(state.db.write(), input.id).await? {
        return Err(AppError::not_found("faq", input.id));
    }
    Ok(Ack::ok())
}

pub async fn create_past_paper(
    State(state): State<AppState>,
    auth: AuthContext,
    Input(input): Input<PastPaperInput>,
) -> Result<Json<PastPaper>> {
    auth.require_admin()?;
    PastPaperRepository::create(
        state.db.write(),
        NewPastPaper {
            module_id: input.module_id,
            title: input.title,
            year: input.year,
            school_level: input.school_level,
            file_url: input.file_url,
            correction_url: input.correction_url,
        },
    )
    .await
    .map(Json)
}
