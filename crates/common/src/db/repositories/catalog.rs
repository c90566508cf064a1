//! Catalog repository: modules, chapters, sheets and sheet unlocks

use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewModule {
    pub title: String,
    pub description: String,
    pub school_level: String,
    pub position: i32,
    pub professor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub school_level: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewChapter {
    pub module_id: Uuid,
    pub title: String,
    pub position: i32,
}

#[derive(Debug, Clone)]
pub struct NewSheet {
    pub chapter_id: Uuid,
    pub title: String,
    pub kind: SheetKind,
    pub content: String,
    pub token_cost: i32,
    pub position: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SheetChanges {
    pub title: Option<String>,
    pub kind: Option<SheetKind>,
    pub content: Option<String>,
    pub token_cost: Option<i32>,
    pub position: Option<i32>,
}

pub struct CatalogRepository;

impl CatalogRepository {
    // ========================================================================
    // Modules
    // ========================================================================

    pub async fn create_module<C: ConnectionTrait>(db: &C, new: NewModule) -> Result<Module> {
        let now = Utc::now();

        let module = ModuleActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new.title),
            description: Set(new.description),
            school_level: Set(new.school_level),
            position: Set(new.position),
            professor_id: Set(new.professor_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        module.insert(db).await.map_err(Into::into)
    }

    pub async fn find_module<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Module>> {
        ModuleEntity::find_by_id(id).one(db).await.map_err(Into::into)
    }

    pub async fn get_module<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Module> {
        Self::find_module(db, id)
            .await?
            .ok_or_else(|| AppError::not_found("module", id))
    }

    /// Modules ordered by position, optionally restricted to a school level
    pub async fn list_modules<C: ConnectionTrait>(
        db: &C,
        school_level: Option<&str>,
    ) -> Result<Vec<Module>> {
        let mut query = ModuleEntity::find();
        if let Some(level) = school_level {
            query = query.filter(ModuleColumn::SchoolLevel.eq(level));
        }

        query
            .order_by_asc(ModuleColumn::Position)
            .order_by_asc(ModuleColumn::Title)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub async fn list_modules_by_professor<C: ConnectionTrait>(
        db: &C,
        professor_id: Uuid,
    ) -> Result<Vec<Module>> {
        ModuleEntity::find()
            .filter(ModuleColumn::ProfessorId.eq(professor_id))
            .order_by_asc(ModuleColumn::Position)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub async fn update_module<C: ConnectionTrait>(
        db: &C,
        module: Module,
        changes: ModuleChanges,
    ) -> Result<Module> {
        let mut active = module.into_active_model();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(level) = changes.school_level {
            active.school_level = Set(level);
        }
        if let Some(position) = changes.position {
            active.position = Set(position);
        }
        active.updated_at = Set(Utc::now().into());
        active.update(db).await.map_err(Into::into)
    }

    /// Deletes the module; chapters and sheets cascade
    pub async fn delete_module<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool> {
        let result = ModuleEntity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Chapters
    // ========================================================================

    pub async fn create_chapter<C: ConnectionTrait>(db: &C, new: NewChapter) -> Result<Chapter> {
        let now = Utc::now();

        let chapter = ChapterActiveModel {
            id: Set(Uuid::new_v4()),
            module_id: Set(new.module_id),
            title: Set(new.title),
            position: Set(new.position),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        chapter.insert(db).await.map_err(Into::into)
    }

    pub async fn find_chapter<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Chapter>> {
        ChapterEntity::find_by_id(id).one(db).await.map_err(Into::into)
    }

    pub async fn get_chapter<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Chapter> {
        Self::find_chapter(db, id)
            .await?
            .ok_or_else(|| AppError::not_found("chapter", id))
    }

    pub async fn list_chapters<C: ConnectionTrait>(db: &C, module_id: Uuid) -> Result<Vec<Chapter>> {
        ChapterEntity::find()
            .filter(ChapterColumn::ModuleId.eq(module_id))
            .order_by_asc(ChapterColumn::Position)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub async fn delete_chapter<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool> {
        let result = ChapterEntity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Sheets
    // ========================================================================

    pub async fn create_sheet<C: ConnectionTrait>(db: &C, new: NewSheet) -> Result<Sheet> {
        let now = Utc::now();

        let sheet = SheetActiveModel {
            id: Set(Uuid::new_v4()),
            chapter_id: Set(new.chapter_id),
            title: Set(new.title),
            kind: Set(new.kind.into()),
            content: Set(new.content),
            token_cost: Set(new.token_cost),
            position: Set(new.position),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        sheet.insert(db).await.map_err(Into::into)
    }

    pub async fn find_sheet<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Sheet>> {
        SheetEntity::find_by_id(id).one(db).await.map_err(Into::into)
    }

    pub async fn get_sheet<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Sheet> {
        Self::find_sheet(db, id)
            .await?
            .ok_or_else(|| AppError::SheetNotFound { id: id.to_string() })
    }

    pub async fn list_sheets<C: ConnectionTrait>(db: &C, chapter_id: Uuid) -> Result<Vec<Sheet>> {
        SheetEntity::find()
            .filter(SheetColumn::ChapterId.eq(chapter_id))
            .order_by_asc(SheetColumn::Position)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub async fn update_sheet<C: ConnectionTrait>(
        db: &C,
        sheet: Sheet,
        changes: SheetChanges,
    ) -> Result<Sheet> {
        let mut active = sheet.into_active_model();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(kind) = changes.kind {
            active.kind = Set(kind.into());
        }
        if let Some(content) = changes.content {
            active.content = Set(content);
        }
        if let Some(cost) = changes.token_cost {
            active.token_cost = Set(cost);
        }
        if let Some(position) = changes.position {
            active.position = Set(position);
        }
        active.updated_at = Set(Utc::now().into());
        active.update(db).await.map_err(Into::into)
    }

    pub async fn delete_sheet<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool> {
        let result = SheetEntity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Sheet unlocks
    // ========================================================================

    pub async fn find_unlock<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        sheet_id: Uuid,
    ) -> Result<Option<SheetUnlock>> {
        SheetUnlockEntity::find()
            .filter(SheetUnlockColumn::UserId.eq(user_id))
            .filter(SheetUnlockColumn::SheetId.eq(sheet_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub async fn insert_unlock<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        sheet_id: Uuid,
        tokens_spent: i32,
    ) -> Result<SheetUnlock> {
        let unlock = SheetUnlockActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            sheet_id: Set(sheet_id),
            tokens_spent: Set(tokens_spent),
            created_at: Set(Utc::now().into()),
        };

        unlock.insert(db).await.map_err(Into::into)
    }

    pub async fn list_unlocks<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<Vec<SheetUnlock>> {
        SheetUnlockEntity::find()
            .filter(SheetUnlockColumn::UserId.eq(user_id))
            .order_by_desc(SheetUnlockColumn::CreatedAt)
            .all(db)
            .await
            .map_err(Into::into)
    }
}
