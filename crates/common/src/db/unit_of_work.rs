//! Unit of work: run a closure inside one database transaction
//!
//! The transaction handle is passed explicitly to the closure. Repositories
//! are generic over `ConnectionTrait`, so the same calls work on a pooled
//! connection or on the transaction.

use crate::errors::{AppError, Result};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

/// Future returned by a unit of work closure, borrowing the transaction
pub type WorkFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'c>>;

/// Transaction scope bound to the primary connection
#[derive(Clone)]
pub struct UnitOfWork {
    conn: DatabaseConnection,
}

impl UnitOfWork {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Begin a transaction, run `work`, commit on `Ok` and roll back on `Err`.
    ///
    /// ```ignore
    /// let user = db.unit_of_work().run(move |txn| Box::pin(async move {
    ///     let user = UserRepository::create(txn, new_user).await?;
    ///     TokenBalanceRepository::ensure(txn, user.id).await?;
    ///     Ok(user)
    /// })).await?;
    /// ```
    pub async fn run<F, T>(&self, work: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> WorkFuture<'c, T> + Send,
        T: Send,
    {
        let txn = self.conn.begin().await.map_err(|e| AppError::DatabaseConnection {
            message: format!("Failed to begin transaction: {}", e),
        })?;

        match work(&txn).await {
            Ok(value) => {
                txn.commit().await?;
                debug!("Unit of work committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                debug!(error = %err, "Unit of work rolled back");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{FaqRepository, NewFaq};
    use crate::db::models::FaqAudience;
    use crate::test_utils::setup_test_db;

    fn faq(question: &str) -> NewFaq {
        NewFaq {
            audience: FaqAudience::All,
            question: question.to_string(),
            answer: "Yes".to_string(),
            position: 0,
            is_published: true,
        }
    }

    #[tokio::test]
    async fn test_commit_persists_all_writes() {
        let pool = setup_test_db().await.unwrap();

        pool.unit_of_work()
            .run(|txn| {
                Box::pin(async move {
                    FaqRepository::create(txn, faq("First?")).await?;
                    FaqRepository::create(txn, faq("Second?")).await?;
                    Ok(())
                })
            })
            .await
            .unwrap();

        let faqs = FaqRepository::list_for(pool.read(), FaqAudience::Student).await.unwrap();
        assert_eq!(faqs.len(), 2);
    }

    #[tokio::test]
    async fn test_error_rolls_back_all_writes() {
        let pool = setup_test_db().await.unwrap();

        let result: Result<()> = pool
            .unit_of_work()
            .run(|txn| {
                Box::pin(async move {
                    FaqRepository::create(txn, faq("Lost?")).await?;
                    Err(AppError::Internal {
                        message: "boom".to_string(),
                    })
                })
            })
            .await;

        assert!(result.is_err());
        let faqs = FaqRepository::list_for(pool.read(), FaqAudience::Student).await.unwrap();
        assert!(faqs.is_empty());
    }
}
