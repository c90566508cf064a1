//! Parent accounts and the students attached to them

use crate::db::models::User;
use crate::db::repositories::{TokenBalanceRepository, UserRepository};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::metrics;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSummary {
    pub user: User,
    pub token_balance: i64,
}

#[derive(Clone)]
pub struct FamilyService {
    db: DbPool,
}

impl FamilyService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Attach the student registered under `child_email` to the parent
    pub async fn link_child(&self, parent_id: Uuid, child_email: &str) -> Result<User> {
        let parent = self.parent(parent_id).await?;

        let child = UserRepository::find_by_email(self.db.read(), child_email.trim())
            .await?
            .filter(|u| u.is_student())
            .ok_or_else(|| AppError::InvalidUser {
                message: "No student account is registered with this email".to_string(),
            })?;

        match child.parent_id {
            Some(existing) if existing == parent.id => return Ok(child),
            Some(_) => {
                return Err(AppError::Conflict {
                    message: "This student is already linked to another parent".to_string(),
                })
            }
            None => {}
        }

        let child = UserRepository::set_parent(self.db.write(), child, Some(parent.id)).await?;
        info!(parent_id = %parent.id, child_id = %child.id, "Child linked");
        Ok(child)
    }

    pub async fn list_children(&self, parent_id: Uuid) -> Result<Vec<ChildSummary>> {
        let parent = self.parent(parent_id).await?;

        let children = UserRepository::list_children(self.db.read(), parent.id).await?;
        let mut summaries = Vec::with_capacity(children.len());
        for user in children {
            let token_balance = TokenBalanceRepository::get(self.db.read(), user.id).await?;
            summaries.push(ChildSummary { user, token_balance });
        }
        Ok(summaries)
    }

    pub async fn unlink_child(&self, parent_id: Uuid, child_id: Uuid) -> Result<User> {
        let parent = self.parent(parent_id).await?;
        let child = self.child_of(&parent, child_id).await?;

        let child = UserRepository::set_parent(self.db.write(), child, None).await?;
        info!(parent_id = %parent.id, child_id = %child.id, "Child unlinked");
        Ok(child)
    }

    /// Move tokens from the parent's balance to a linked child's.
    /// Returns the parent's and the child's new balances.
    pub async fn transfer_tokens(&self, parent_id: Uuid, child_id: Uuid, amount: i64) -> Result<(i64, i64)> {
        if amount <= 0 {
            return Err(AppError::Validation {
                message: "amount must be positive".to_string(),
                field: Some("amount".to_string()),
            });
        }

        let parent = self.parent(parent_id).await?;
        let child = self.child_of(&parent, child_id).await?;

        let (from, to) = (parent.id, child.id);
        let balances = self
            .db
            .unit_of_work()
            .run(move |txn| {
                Box::pin(async move {
                    if !TokenBalanceRepository::debit_if_sufficient(txn, from, amount).await? {
                        let available = TokenBalanceRepository::get(txn, from).await?;
                        return Err(AppError::InsufficientTokens {
                            required: amount,
                            available,
                        });
                    }
                    let child_balance = TokenBalanceRepository::credit(txn, to, amount).await?;
                    let parent_balance = TokenBalanceRepository::get(txn, from).await?;
                    Ok((parent_balance, child_balance))
                })
            })
            .await?;

        metrics::record_tokens_credited(amount, "transfer");
        info!(parent_id = %from, child_id = %to, amount, "Tokens transferred");
        Ok(balances)
    }

    async fn parent(&self, parent_id: Uuid) -> Result<User> {
        let parent = UserRepository::get(self.db.read(), parent_id).await?;
        if !parent.is_parent() {
            return Err(AppError::InvalidParent {
                message: "Only parent accounts can manage children".to_string(),
            });
        }
        Ok(parent)
    }

    async fn child_of(&self, parent: &User, child_id: Uuid) -> Result<User> {
        UserRepository::find_by_id(self.db.read(), child_id)
            .await?
            .filter(|c| c.parent_id == Some(parent.id))
            .ok_or_else(|| AppError::InvalidUser {
                message: "This student is not linked to your account".to_string(),
            })
    }
}
