//! Repositories for data access
//!
//! Each repository is a thin pass-through over SeaORM: one query or one
//! save per method. Methods take any `ConnectionTrait`, so callers pass
//! `DbPool::read()`, `DbPool::write()` or a unit-of-work transaction.

mod billing;
mod catalog;
mod faq;
mod past_papers;
mod professors;
mod promotions;
mod tokens;
mod users;
mod verification;

pub use billing::{BillingRepository, InvoiceRecord, NewPayment, NewPlan, SubscriptionRecord};
pub use catalog::{CatalogRepository, ModuleChanges, NewChapter, NewModule, NewSheet, SheetChanges};
pub use faq::{FaqRepository, NewFaq};
pub use past_papers::{NewPastPaper, PastPaperFilter, PastPaperRepository};
pub use professors::{NewProfessor, ProfessorRepository};
pub use promotions::{NewPromotionalCode, PromotionalCodeRepository};
pub use tokens::TokenBalanceRepository;
pub use users::{NewUser, ProfileChanges, UserRepository};
pub use verification::{Channel, VerificationCode, VerificationCodeRepository};

use sea_orm::DbErr;

/// True when the error is a unique-constraint violation
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}
