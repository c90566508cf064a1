//! Token balance repository
//!
//! Balances change only through conditional `UPDATE ... SET balance =
//! balance +/- n` statements so concurrent requests never lose a write and
//! a debit never drives a balance below zero.

use crate::db::models::*;
use crate::errors::Result;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

pub struct TokenBalanceRepository;

impl TokenBalanceRepository {
    /// Current balance; a user without a row has zero tokens
    pub async fn get<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<i64> {
        let row = TokenBalanceEntity::find_by_id(user_id).one(db).await?;
        Ok(row.map(|b| b.balance).unwrap_or(0))
    }

    pub async fn find<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<Option<TokenBalance>> {
        TokenBalanceEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Create a zero balance row if none exists
    pub async fn ensure<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<()> {
        let row = TokenBalanceActiveModel {
            user_id: Set(user_id),
            balance: Set(0),
            updated_at: Set(Utc::now().into()),
        };

        TokenBalanceEntity::insert(row)
            .on_conflict(
                OnConflict::column(TokenBalanceColumn::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        Ok(())
    }

    /// Add `amount` tokens and return the new balance
    pub async fn credit<C: ConnectionTrait>(db: &C, user_id: Uuid, amount: i64) -> Result<i64> {
        Self::ensure(db, user_id).await?;

        TokenBalanceEntity::update_many()
            .col_expr(
                TokenBalanceColumn::Balance,
                Expr::col(TokenBalanceColumn::Balance).add(amount),
            )
            .col_expr(TokenBalanceColumn::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(TokenBalanceColumn::UserId.eq(user_id))
            .exec(db)
            .await?;

        Self::get(db, user_id).await
    }

    /// Subtract `amount` only if the balance covers it.
    ///
    /// Returns `false`, leaving the balance untouched, when it does not.
    pub async fn debit_if_sufficient<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        amount: i64,
    ) -> Result<bool> {
        let result = TokenBalanceEntity::update_many()
            .col_expr(
                TokenBalanceColumn::Balance,
                Expr::col(TokenBalanceColumn::Balance).sub(amount),
            )
            .col_expr(TokenBalanceColumn::UpdatedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(TokenBalanceColumn::UserId.eq(user_id))
            .filter(TokenBalanceColumn::Balance.gte(amount))
            .exec(db)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_user, setup_test_db};

    #[tokio::test]
    async fn test_missing_row_reads_as_zero() {
        let pool = setup_test_db().await.unwrap();
        assert_eq!(TokenBalanceRepository::get(pool.read(), Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ensure_keeps_existing_balance() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "a@example.com", Role::Student).await.unwrap();

        TokenBalanceRepository::credit(pool.write(), user.id, 12).await.unwrap();
        TokenBalanceRepository::ensure(pool.write(), user.id).await.unwrap();

        assert_eq!(TokenBalanceRepository::get(pool.read(), user.id).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_debit_requires_sufficient_balance() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "b@example.com", Role::Student).await.unwrap();
        TokenBalanceRepository::credit(pool.write(), user.id, 5).await.unwrap();

        assert!(!TokenBalanceRepository::debit_if_sufficient(pool.write(), user.id, 6).await.unwrap());
        assert_eq!(TokenBalanceRepository::get(pool.read(), user.id).await.unwrap(), 5);

        assert!(TokenBalanceRepository::debit_if_sufficient(pool.write(), user.id, 5).await.unwrap());
        assert_eq!(TokenBalanceRepository::get(pool.read(), user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_debit_without_row_fails() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "c@example.com", Role::Student).await.unwrap();
        assert!(!TokenBalanceRepository::debit_if_sufficient(pool.write(), user.id, 1).await.unwrap());
    }
}
