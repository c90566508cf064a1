//! RPC procedure handlers, one module per namespace

pub mod admin;
pub mod auth;
pub mod billing;
pub mod catalog;
pub mod family;
pub mod faq;
pub mod health;
pub mod past_papers;
pub mod professor;
pub mod tokens;
pub mod user;
pub mod verification;
pub mod webhooks;

use axum::{
    extract::{FromRequest, Request},
    http::Uri,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use tutorly_common::errors::{AppError, Result};
use validator::Validate;

/// Validated JSON input of a procedure
///
/// Malformed bodies become `InvalidFormat` and failed rules become
/// `Validation`, so every rejection carries the standard error body.
pub struct Input<T>(pub T);

impl<S, T> FromRequest<S> for Input<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidFormat {
                message: rejection.body_text(),
            })?;
        value.validate()?;
        Ok(Input(value))
    }
}

/// Output of procedures with nothing to return
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Json<Self> {
        Json(Ack { ok: true })
    }
}

pub async fn unknown_procedure(uri: Uri) -> AppError {
    AppError::NotFound {
        resource_type: "procedure".to_string(),
        id: uri.path().trim_start_matches("/rpc/").to_string(),
    }
}
