//! Promotional code repository

use crate::db::models::*;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewPromotionalCode {
    pub code: String,
    pub percent_off: Option<i32>,
    pub bonus_tokens: i32,
    pub max_redemptions: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct PromotionalCodeRepository;

impl PromotionalCodeRepository {
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        new: NewPromotionalCode,
    ) -> Result<PromotionalCode> {
        let promo = PromotionalCodeActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(new.code.trim().to_uppercase()),
            percent_off: Set(new.percent_off),
            bonus_tokens: Set(new.bonus_tokens),
            max_redemptions: Set(new.max_redemptions),
            redemptions: Set(0),
            expires_at: Set(new.expires_at.map(Into::into)),
            is_active: Set(true),
            created_at: Set(Utc::now().into()),
        };

        promo.insert(db).await.map_err(Into::into)
    }

    /// Case-insensitive lookup
    pub async fn find_by_code<C: ConnectionTrait>(
        db: &C,
        code: &str,
    ) -> Result<Option<PromotionalCode>> {
        PromotionalCodeEntity::find()
            .filter(PromotionalCodeColumn::Code.eq(code.trim().to_uppercase()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub async fn list<C: ConnectionTrait>(db: &C) -> Result<Vec<PromotionalCode>> {
        PromotionalCodeEntity::find()
            .order_by_desc(PromotionalCodeColumn::CreatedAt)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub async fn deactivate<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool> {
        let result = PromotionalCodeEntity::update_many()
            .col_expr(PromotionalCodeColumn::IsActive, Expr::value(false))
            .filter(PromotionalCodeColumn::Id.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Count one redemption if the code is active and below its cap.
    ///
    /// Expiry is checked by the caller against `PromotionalCode::is_expired`.
    pub async fn redeem<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool> {
        let below_cap = Condition::any()
            .add(PromotionalCodeColumn::MaxRedemptions.is_null())
            .add(
                Expr::col(PromotionalCodeColumn::Redemptions)
                    .lt(Expr::col(PromotionalCodeColumn::MaxRedemptions)),
            );

        let result = PromotionalCodeEntity::update_many()
            .col_expr(
                PromotionalCodeColumn::Redemptions,
                Expr::col(PromotionalCodeColumn::Redemptions).add(1),
            )
            .filter(PromotionalCodeColumn::Id.eq(id))
            .filter(PromotionalCodeColumn::IsActive.eq(true))
            .filter(below_cap)
            .exec(db)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    fn promo(code: &str, max: Option<i32>) -> NewPromotionalCode {
        NewPromotionalCode {
            code: code.to_string(),
            percent_off: Some(20),
            bonus_tokens: 10,
            max_redemptions: max,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_codes_are_case_insensitive() {
        let pool = setup_test_db().await.unwrap();
        PromotionalCodeRepository::create(pool.write(), promo(" rentree24 ", None))
            .await
            .unwrap();

        let found = PromotionalCodeRepository::find_by_code(pool.read(), "Rentree24")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.code, "RENTREE24");
    }

    #[tokio::test]
    async fn test_redeem_stops_at_cap() {
        let pool = setup_test_db().await.unwrap();
        let code = PromotionalCodeRepository::create(pool.write(), promo("TWICE", Some(2)))
            .await
            .unwrap();

        assert!(PromotionalCodeRepository::redeem(pool.write(), code.id).await.unwrap());
        assert!(PromotionalCodeRepository::redeem(pool.write(), code.id).await.unwrap());
        assert!(!PromotionalCodeRepository::redeem(pool.write(), code.id).await.unwrap());

        let code = PromotionalCodeRepository::find_by_code(pool.read(), "twice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code.redemptions, 2);
        assert!(code.is_exhausted());
    }

    #[tokio::test]
    async fn test_deactivated_code_cannot_be_redeemed() {
        let pool = setup_test_db().await.unwrap();
        let code = PromotionalCodeRepository::create(pool.write(), promo("OFF", None))
            .await
            .unwrap();

        assert!(PromotionalCodeRepository::deactivate(pool.write(), code.id).await.unwrap());
        assert!(!PromotionalCodeRepository::redeem(pool.write(), code.id).await.unwrap());
    }
}
