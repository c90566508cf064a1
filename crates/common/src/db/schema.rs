//! Schema generation from entity definitions
//!
//! Production databases are migrated with the SQL files under
//! `migrations/`. SQLite databases (tests, local tooling) get their tables
//! straight from the entities, which carry the same uniqueness and
//! foreign-key constraints.

use crate::db::models::*;
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, EntityTrait, Schema};

/// Create every table, in foreign-key order
pub async fn create_all<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, UserEntity).await?;
    create_table(db, &schema, ProfessorEntity).await?;
    create_table(db, &schema, ModuleEntity).await?;
    create_table(db, &schema, ChapterEntity).await?;
    create_table(db, &schema, SheetEntity).await?;
    create_table(db, &schema, SheetUnlockEntity).await?;
    create_table(db, &schema, TokenBalanceEntity).await?;
    create_table(db, &schema, SubscriptionPlanEntity).await?;
    create_table(db, &schema, SubscriptionEntity).await?;
    create_table(db, &schema, PromotionalCodeEntity).await?;
    create_table(db, &schema, PaymentEntity).await?;
    create_table(db, &schema, InvoiceEntity).await?;
    create_table(db, &schema, SmsValidationCodeEntity).await?;
    create_table(db, &schema, EmailValidationCodeEntity).await?;
    create_table(db, &schema, FaqEntity).await?;
    create_table(db, &schema, PastPaperEntity).await?;

    let unlock_index = Index::create()
        .name("idx_sheet_unlocks_user_sheet")
        .table(SheetUnlockEntity)
        .col(SheetUnlockColumn::UserId)
        .col(SheetUnlockColumn::SheetId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&unlock_index)).await?;

    Ok(())
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{Database, QuerySelect};

    #[tokio::test]
    async fn test_create_all_is_idempotent() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        create_all(&db).await.unwrap();
        create_all(&db).await.unwrap();

        let users = UserEntity::find().limit(1).all(&db).await.unwrap();
        assert!(users.is_empty());
        let papers = PastPaperEntity::find().limit(1).all(&db).await.unwrap();
        assert!(papers.is_empty());
    }
}
