//! Email and SMS verification codes
//!
//! A code is stored hashed with an expiry and an attempt counter. Sending a
//! new code invalidates the outstanding ones; a code can be consumed once.

use super::on_unique_violation;
use crate::auth::{generate_code, hash_code, hashes_match};
use crate::config::VerificationConfig;
use crate::db::repositories::{Channel, UserRepository, VerificationCodeRepository};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::integrations::{EmailMessage, EmailSender, SmsGateway};
use crate::metrics;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSent {
    pub channel: Channel,
    pub destination: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct VerificationService {
    db: DbPool,
    sms: Arc<dyn SmsGateway>,
    email: Arc<dyn EmailSender>,
    config: VerificationConfig,
}

impl VerificationService {
    pub fn new(
        db: DbPool,
        sms: Arc<dyn SmsGateway>,
        email: Arc<dyn EmailSender>,
        config: VerificationConfig,
    ) -> Self {
        Self { db, sms, email, config }
    }

    /// Send a code to the user's email address
    pub async fn send_email_code(&self, user_id: Uuid) -> Result<CodeSent> {
        let user = UserRepository::get(self.db.read(), user_id).await?;
        if user.email_verified {
            return Err(AppError::Conflict {
                message: "Email address is already verified".to_string(),
            });
        }

        let (code, sent) = self.issue(Channel::Email, user.id, user.email.clone()).await?;
        self.email
            .send(EmailMessage {
                to: user.email,
                subject: "Votre code de vérification Tutorly".to_string(),
                text: format!(
                    "Bonjour {},\n\nVotre code de vérification est {}.\nIl expire dans {} minutes.",
                    user.first_name,
                    code,
                    self.config.code_ttl_secs / 60
                ),
            })
            .await?;

        Ok(sent)
    }

    /// Attach `phone` to the user and send a code to it
    pub async fn send_sms_code(&self, user_id: Uuid, phone: String) -> Result<CodeSent> {
        let user = UserRepository::get(self.db.read(), user_id).await?;

        if let Some(owner) = UserRepository::find_by_phone(self.db.read(), &phone).await? {
            if owner.id != user.id {
                return Err(AppError::Conflict {
                    message: "Phone number is already used by another account".to_string(),
                });
            }
        }

        let user = UserRepository::set_phone(self.db.write(), user, phone.clone())
            .await
            .map_err(|e| {
                on_unique_violation(e, || AppError::Conflict {
                    message: "Phone number is already used by another account".to_string(),
                })
            })?;

        let (code, sent) = self.issue(Channel::Sms, user.id, phone.clone()).await?;
        self.sms
            .send(
                &phone,
                &format!("Tutorly : votre code de vérification est {}", code),
            )
            .await?;

        Ok(sent)
    }

    /// Check `code` against the user's latest code on `channel`
    pub async fn verify(&self, user_id: Uuid, channel: Channel, code: &str) -> Result<()> {
        let stored = VerificationCodeRepository::latest_unconsumed(self.db.read(), channel, user_id)
            .await?
            .ok_or(AppError::InvalidVerificationCode)?;

        if stored.is_expired() {
            metrics::record_verification_attempt(&channel.to_string(), "expired");
            return Err(AppError::VerificationCodeExpired);
        }
        let max_attempts = self.config.max_attempts;
        if !VerificationCodeRepository::claim_attempt(self.db.write(), channel, stored.id, max_attempts).await? {
            metrics::record_verification_attempt(&channel.to_string(), "locked");
            return Err(AppError::TooManyAttempts);
        }

        if !hashes_match(&hash_code(code), &stored.code_hash) {
            metrics::record_verification_attempt(&channel.to_string(), "mismatch");
            warn!(%user_id, %channel, attempts = stored.attempts + 1, "Wrong verification code");

            return if stored.attempts + 1 >= max_attempts {
                Err(AppError::TooManyAttempts)
            } else {
                Err(AppError::InvalidVerificationCode)
            };
        }

        let code_id = stored.id;
        self.db
            .unit_of_work()
            .run(move |txn| {
                Box::pin(async move {
                    if !VerificationCodeRepository::consume(txn, channel, code_id, max_attempts).await? {
                        return Err(AppError::InvalidVerificationCode);
                    }
                    match channel {
                        Channel::Email => UserRepository::mark_email_verified(txn, user_id).await?,
                        Channel::Sms => UserRepository::mark_phone_verified(txn, user_id).await?,
                    };
                    Ok(())
                })
            })
            .await?;

        metrics::record_verification_attempt(&channel.to_string(), "verified");
        info!(%user_id, %channel, "Verification succeeded");
        Ok(())
    }

    /// Replace outstanding codes with a fresh one and return it in clear
    async fn issue(&self, channel: Channel, user_id: Uuid, destination: String) -> Result<(String, CodeSent)> {
        let code = generate_code(self.config.code_length);
        let code_hash = hash_code(&code);
        let expires_at = Utc::now() + Duration::seconds(self.config.code_ttl_secs);

        let stored_destination = destination.clone();
        self.db
            .unit_of_work()
            .run(move |txn| {
                Box::pin(async move {
                    VerificationCodeRepository::invalidate_outstanding(txn, channel, user_id).await?;
                    VerificationCodeRepository::insert(
                        txn,
                        channel,
                        user_id,
                        &stored_destination,
                        &code_hash,
                        expires_at,
                    )
                    .await
                })
            })
            .await?;

        metrics::record_code_sent(&channel.to_string());
        info!(%user_id, %channel, "Verification code issued");

        Ok((
            code,
            CodeSent {
                channel,
                destination,
                expires_at,
            },
        ))
    }
}
