//! Shared fixtures for unit tests

use crate::db::models::*;
use crate::db::repositories::{
    BillingRepository, CatalogRepository, NewChapter, NewModule, NewPlan, NewProfessor, NewSheet,
    NewUser, ProfessorRepository, UserRepository,
};
use crate::db::{schema, DbPool};
use crate::errors::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database};

/// Fresh in-memory SQLite database with the full schema.
///
/// The pool holds a single connection: every connection to
/// `sqlite::memory:` opens its own empty database.
pub async fn setup_test_db() -> Result<DbPool> {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);

    let conn = Database::connect(opts).await?;
    schema::create_all(&conn).await?;
    Ok(DbPool::from_connection(conn))
}

/// Insert a user with a placeholder password hash
pub async fn create_test_user<C: ConnectionTrait>(db: &C, email: &str, role: Role) -> Result<User> {
    UserRepository::create(
        db,
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role,
            school_level: Some("seconde".to_string()),
        },
    )
    .await
}

pub async fn create_test_professor<C: ConnectionTrait>(db: &C, email: &str) -> Result<Professor> {
    ProfessorRepository::create(
        db,
        NewProfessor {
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            first_name: "Marie".to_string(),
            last_name: "Curie".to_string(),
            subject: "Physique-Chimie".to_string(),
            bio: None,
        },
    )
    .await
}

pub struct TestCatalog {
    pub module: Module,
    pub chapter: Chapter,
    pub free_sheet: Sheet,
    pub paid_sheet: Sheet,
}

/// One module with one chapter holding a free sheet and a sheet costing `cost` tokens
pub async fn create_test_catalog<C: ConnectionTrait>(db: &C, cost: i32) -> Result<TestCatalog> {
    let module = CatalogRepository::create_module(
        db,
        NewModule {
            title: "Mathematiques".to_string(),
            description: "Programme de seconde".to_string(),
            school_level: "seconde".to_string(),
            position: 1,
            professor_id: None,
        },
    )
    .await?;

    let chapter = CatalogRepository::create_chapter(
        db,
        NewChapter {
            module_id: module.id,
            title: "Fonctions".to_string(),
            position: 1,
        },
    )
    .await?;

    let free_sheet = CatalogRepository::create_sheet(
        db,
        NewSheet {
            chapter_id: chapter.id,
            title: "Cours".to_string(),
            kind: SheetKind::Lesson,
            content: "Une fonction associe...".to_string(),
            token_cost: 0,
            position: 1,
        },
    )
    .await?;

    let paid_sheet = CatalogRepository::create_sheet(
        db,
        NewSheet {
            chapter_id: chapter.id,
            title: "Exercices corriges".to_string(),
            kind: SheetKind::Exercise,
            content: "Exercice 1...".to_string(),
            token_cost: cost,
            position: 2,
        },
    )
    .await?;

    Ok(TestCatalog {
        module,
        chapter,
        free_sheet,
        paid_sheet,
    })
}

pub async fn create_test_plan<C: ConnectionTrait>(
    db: &C,
    code: &str,
    price_cents: i64,
    tokens_per_period: i32,
) -> Result<SubscriptionPlan> {
    BillingRepository::create_plan(
        db,
        NewPlan {
            code: code.to_string(),
            name: code.to_uppercase(),
            stripe_price_id: format!("price_{}", code),
            price_cents,
            currency: "eur".to_string(),
            interval: if code == "yearly" {
                BillingInterval::Year
            } else {
                BillingInterval::Month
            },
            tokens_per_period,
        },
    )
    .await
}
