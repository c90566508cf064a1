//! Verification code repository
//!
//! Email and SMS codes live in separate tables with the same shape. This
//! repository exposes both through one `VerificationCode` view selected by
//! `Channel`.

use crate::db::models::*;
use crate::errors::Result;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Email => f.write_str("email"),
            Channel::Sms => f.write_str("sms"),
        }
    }
}

/// A stored code, whichever table it came from
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationCode {
    pub id: Uuid,
    pub channel: Channel,
    pub user_id: Uuid,
    /// Email address or phone number the code was sent to
    pub destination: String,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: DateTime<FixedOffset>,
    pub consumed_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

impl VerificationCode {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now().fixed_offset()
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}

impl From<EmailValidationCode> for VerificationCode {
    fn from(m: EmailValidationCode) -> Self {
        Self {
            id: m.id,
            channel: Channel::Email,
            user_id: m.user_id,
            destination: m.email,
            code_hash: m.code_hash,
            attempts: m.attempts,
            expires_at: m.expires_at,
            consumed_at: m.consumed_at,
            created_at: m.created_at,
        }
    }
}

impl From<SmsValidationCode> for VerificationCode {
    fn from(m: SmsValidationCode) -> Self {
        Self {
            id: m.id,
            channel: Channel::Sms,
            user_id: m.user_id,
            destination: m.phone,
            code_hash: m.code_hash,
            attempts: m.attempts,
            expires_at: m.expires_at,
            consumed_at: m.consumed_at,
            created_at: m.created_at,
        }
    }
}

pub struct VerificationCodeRepository;

impl VerificationCodeRepository {
    pub async fn insert<C: ConnectionTrait>(
        db: &C,
        channel: Channel,
        user_id: Uuid,
        destination: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<VerificationCode> {
        let now = Utc::now();

        let code: VerificationCode = match channel {
            Channel::Email => EmailValidationCodeActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                email: Set(destination.to_string()),
                code_hash: Set(code_hash.to_string()),
                attempts: Set(0),
                expires_at: Set(expires_at.into()),
                consumed_at: Set(None),
                created_at: Set(now.into()),
            }
            .insert(db)
            .await?
            .into(),
            Channel::Sms => SmsValidationCodeActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                phone: Set(destination.to_string()),
                code_hash: Set(code_hash.to_string()),
                attempts: Set(0),
                expires_at: Set(expires_at.into()),
                consumed_at: Set(None),
                created_at: Set(now.into()),
            }
            .insert(db)
            .await?
            .into(),
        };

        Ok(code)
    }

    /// Newest unconsumed code for the user; may be expired
    pub async fn latest_unconsumed<C: ConnectionTrait>(
        db: &C,
        channel: Channel,
        user_id: Uuid,
    ) -> Result<Option<VerificationCode>> {
        let code: Option<VerificationCode> = match channel {
            Channel::Email => EmailValidationCodeEntity::find()
                .filter(EmailValidationCodeColumn::UserId.eq(user_id))
                .filter(EmailValidationCodeColumn::ConsumedAt.is_null())
                .order_by_desc(EmailValidationCodeColumn::CreatedAt)
                .one(db)
                .await?
                .map(Into::into),
            Channel::Sms => SmsValidationCodeEntity::find()
                .filter(SmsValidationCodeColumn::UserId.eq(user_id))
                .filter(SmsValidationCodeColumn::ConsumedAt.is_null())
                .order_by_desc(SmsValidationCodeColumn::CreatedAt)
                .one(db)
                .await?
                .map(Into::into),
        };

        Ok(code)
    }

    /// Count one attempt against a live code.
    ///
    /// Returns `false` when the code is consumed or already at `max_attempts`;
    /// the caller must not compare the guess in that case.
    pub async fn claim_attempt<C: ConnectionTrait>(
        db: &C,
        channel: Channel,
        id: Uuid,
        max_attempts: i32,
    ) -> Result<bool> {
        let result = match channel {
            Channel::Email => {
                EmailValidationCodeEntity::update_many()
                    .col_expr(
                        EmailValidationCodeColumn::Attempts,
                        Expr::col(EmailValidationCodeColumn::Attempts).add(1),
                    )
                    .filter(EmailValidationCodeColumn::Id.eq(id))
                    .filter(EmailValidationCodeColumn::Attempts.lt(max_attempts))
                    .filter(EmailValidationCodeColumn::ConsumedAt.is_null())
                    .exec(db)
                    .await?
            }
            Channel::Sms => {
                SmsValidationCodeEntity::update_many()
                    .col_expr(
                        SmsValidationCodeColumn::Attempts,
                        Expr::col(SmsValidationCodeColumn::Attempts).add(1),
                    )
                    .filter(SmsValidationCodeColumn::Id.eq(id))
                    .filter(SmsValidationCodeColumn::Attempts.lt(max_attempts))
                    .filter(SmsValidationCodeColumn::ConsumedAt.is_null())
                    .exec(db)
                    .await?
            }
        };

        Ok(result.rows_affected == 1)
    }

    /// Mark the code used. Returns `false` if it was already consumed or
    /// has gone over `max_attempts`.
    pub async fn consume<C: ConnectionTrait>(
        db: &C,
        channel: Channel,
        id: Uuid,
        max_attempts: i32,
    ) -> Result<bool> {
        let now = Utc::now().fixed_offset();

        let result = match channel {
            Channel::Email => {
                EmailValidationCodeEntity::update_many()
                    .col_expr(EmailValidationCodeColumn::ConsumedAt, Expr::value(now))
                    .filter(EmailValidationCodeColumn::Id.eq(id))
                    .filter(EmailValidationCodeColumn::Attempts.lte(max_attempts))
                    .filter(EmailValidationCodeColumn::ConsumedAt.is_null())
                    .exec(db)
                    .await?
            }
            Channel::Sms => {
                SmsValidationCodeEntity::update_many()
                    .col_expr(SmsValidationCodeColumn::ConsumedAt, Expr::value(now))
                    .filter(SmsValidationCodeColumn::Id.eq(id))
                    .filter(SmsValidationCodeColumn::Attempts.lte(max_attempts))
                    .filter(SmsValidationCodeColumn::ConsumedAt.is_null())
                    .exec(db)
                    .await?
            }
        };

        Ok(result.rows_affected == 1)
    }

    /// Consume every outstanding code of the user on this channel
    pub async fn invalidate_outstanding<C: ConnectionTrait>(
        db: &C,
        channel: Channel,
        user_id: Uuid,
    ) -> Result<u64> {
        let now = Utc::now().fixed_offset();

        let result = match channel {
            Channel::Email => {
                EmailValidationCodeEntity::update_many()
                    .col_expr(EmailValidationCodeColumn::ConsumedAt, Expr::value(now))
                    .filter(EmailValidationCodeColumn::UserId.eq(user_id))
                    .filter(EmailValidationCodeColumn::ConsumedAt.is_null())
                    .exec(db)
                    .await?
            }
            Channel::Sms => {
                SmsValidationCodeEntity::update_many()
                    .col_expr(SmsValidationCodeColumn::ConsumedAt, Expr::value(now))
                    .filter(SmsValidationCodeColumn::UserId.eq(user_id))
                    .filter(SmsValidationCodeColumn::ConsumedAt.is_null())
                    .exec(db)
                    .await?
            }
        };

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_user, setup_test_db};
    use chrono::Duration;

    #[tokio::test]
    async fn test_latest_unconsumed_skips_consumed() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "v@example.com", Role::Student).await.unwrap();
        let expires = Utc::now() + Duration::minutes(10);

        let code = VerificationCodeRepository::insert(
            pool.write(),
            Channel::Sms,
            user.id,
            "+33612345678",
            "hash",
            expires,
        )
        .await
        .unwrap();
        assert_eq!(code.channel, Channel::Sms);
        assert!(!code.is_expired());

        assert!(VerificationCodeRepository::consume(pool.write(), Channel::Sms, code.id, 5).await.unwrap());
        assert!(!VerificationCodeRepository::consume(pool.write(), Channel::Sms, code.id, 5).await.unwrap());

        let latest = VerificationCodeRepository::latest_unconsumed(pool.read(), Channel::Sms, user.id)
            .await
            .unwrap();
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn test_channels_are_separate() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "w@example.com", Role::Student).await.unwrap();
        let expires = Utc::now() + Duration::minutes(10);

        VerificationCodeRepository::insert(pool.write(), Channel::Email, user.id, &user.email, "h", expires)
            .await
            .unwrap();

        assert!(VerificationCodeRepository::latest_unconsumed(pool.read(), Channel::Sms, user.id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            VerificationCodeRepository::invalidate_outstanding(pool.write(), Channel::Email, user.id)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_attempts_capped_at_max() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "x@example.com", Role::Student).await.unwrap();
        let code = VerificationCodeRepository::insert(
            pool.write(),
            Channel::Email,
            user.id,
            &user.email,
            "h",
            Utc::now() + Duration::minutes(10),
        )
        .await
        .unwrap();

        for _ in 0..2 {
            assert!(VerificationCodeRepository::claim_attempt(pool.write(), Channel::Email, code.id, 2)
                .await
                .unwrap());
        }
        assert!(!VerificationCodeRepository::claim_attempt(pool.write(), Channel::Email, code.id, 2)
            .await
            .unwrap());

        let stored = VerificationCodeRepository::latest_unconsumed(pool.read(), Channel::Email, user.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.attempts, 2);

        // Over the limit the code cannot be consumed either
        assert!(!VerificationCodeRepository::consume(pool.write(), Channel::Email, code.id, 1)
            .await
            .unwrap());
        assert!(VerificationCodeRepository::consume(pool.write(), Channel::Email, code.id, 2)
            .await
            .unwrap());
        assert!(!VerificationCodeRepository::claim_attempt(pool.write(), Channel::Email, code.id, 5)
            .await
            .unwrap());
    }
}
