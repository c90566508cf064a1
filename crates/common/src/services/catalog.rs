//! Course catalog: browsing, sheet unlocks and professor content management

use crate::db::models::{Chapter, Module, Sheet, SheetKind};
use crate::db::repositories::{
    is_unique_violation, CatalogRepository, ModuleChanges, NewChapter, NewModule, NewSheet, SheetChanges,
    TokenBalanceRepository,
};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::schemas::{ChapterInput, ModuleInput, ModuleUpdateInput, SheetInput, SheetUpdateInput};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Sheet listing entry; content is only served through `read_sheet`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub title: String,
    pub kind: SheetKind,
    pub token_cost: i32,
    pub position: i32,
    pub unlocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockOutcome {
    pub sheet_id: Uuid,
    pub tokens_spent: i32,
    pub balance: i64,
    pub already_unlocked: bool,
}

/// Who is editing catalog content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Editor {
    Professor(Uuid),
    Admin,
}

#[derive(Clone)]
pub struct CatalogService {
    db: DbPool,
}

impl CatalogService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Browsing
    // ========================================================================

    pub async fn list_modules(&self, school_level: Option<&str>) -> Result<Vec<Module>> {
        CatalogRepository::list_modules(self.db.read(), school_level).await
    }

    pub async fn list_chapters(&self, module_id: Uuid) -> Result<Vec<Chapter>> {
        CatalogRepository::get_module(self.db.read(), module_id).await?;
        CatalogRepository::list_chapters(self.db.read(), module_id).await
    }

    /// Sheets of a chapter, flagged with what `user_id` may read
    pub async fn list_sheets(&self, chapter_id: Uuid, user_id: Option<Uuid>) -> Result<Vec<SheetSummary>> {
        CatalogRepository::get_chapter(self.db.read(), chapter_id).await?;
        let sheets = CatalogRepository::list_sheets(self.db.read(), chapter_id).await?;

        let unlocked: Vec<Uuid> = match user_id {
            Some(user_id) => CatalogRepository::list_unlocks(self.db.read(), user_id)
                .await?
                .into_iter()
                .map(|u| u.sheet_id)
                .collect(),
            None => Vec::new(),
        };

        Ok(sheets
            .into_iter()
            .map(|sheet| SheetSummary {
                unlocked: sheet.is_free() || unlocked.contains(&sheet.id),
                kind: sheet.kind(),
                id: sheet.id,
                chapter_id: sheet.chapter_id,
                title: sheet.title,
                token_cost: sheet.token_cost,
                position: sheet.position,
            })
            .collect())
    }

    /// Full sheet, only when it is free or the user unlocked it
    pub async fn read_sheet(&self, user_id: Uuid, sheet_id: Uuid) -> Result<Sheet> {
        let sheet = CatalogRepository::get_sheet(self.db.read(), sheet_id).await?;
        if sheet.is_free() {
            return Ok(sheet);
        }

        match CatalogRepository::find_unlock(self.db.read(), user_id, sheet_id).await? {
            Some(_) => Ok(sheet),
            None => Err(AppError::UnauthorizedAccess {
                message: format!("Sheet is locked; unlock it for {} tokens", sheet.token_cost),
            }),
        }
    }

    /// Spend the sheet's token cost to unlock it. Unlocking twice costs nothing.
    pub async fn unlock_sheet(&self, user_id: Uuid, sheet_id: Uuid) -> Result<UnlockOutcome> {
        let sheet = CatalogRepository::get_sheet(self.db.read(), sheet_id).await?;

        if sheet.is_free() {
            return self.already_unlocked(user_id, sheet_id).await;
        }
        if CatalogRepository::find_unlock(self.db.read(), user_id, sheet_id)
            .await?
            .is_some()
        {
            return self.already_unlocked(user_id, sheet_id).await;
        }

        let cost = sheet.token_cost;
        let result = self
            .db
            .unit_of_work()
            .run(move |txn| {
                Box::pin(async move {
                    let required = i64::from(cost);
                    if !TokenBalanceRepository::debit_if_sufficient(txn, user_id, required).await? {
                        let available = TokenBalanceRepository::get(txn, user_id).await?;
                        return Err(AppError::InsufficientTokens { required, available });
                    }
                    CatalogRepository::insert_unlock(txn, user_id, sheet_id, cost).await?;
                    TokenBalanceRepository::get(txn, user_id).await
                })
            })
            .await;

        match result {
            Ok(balance) => {
                metrics::record_tokens_debited(i64::from(cost));
                info!(%user_id, %sheet_id, cost, balance, "Sheet unlocked");
                Ok(UnlockOutcome {
                    sheet_id,
                    tokens_spent: cost,
                    balance,
                    already_unlocked: false,
                })
            }
            // A concurrent request inserted the unlock first; our debit was rolled back
            Err(AppError::Database(ref e)) if is_unique_violation(e) => {
                self.already_unlocked(user_id, sheet_id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn already_unlocked(&self, user_id: Uuid, sheet_id: Uuid) -> Result<UnlockOutcome> {
        Ok(UnlockOutcome {
            sheet_id,
            tokens_spent: 0,
            balance: TokenBalanceRepository::get(self.db.read(), user_id).await?,
            already_unlocked: true,
        })
    }

    // ========================================================================
    // Content management
    // ========================================================================

    pub async fn modules_of(&self, professor_id: Uuid) -> Result<Vec<Module>> {
        CatalogRepository::list_modules_by_professor(self.db.read(), professor_id).await
    }

    pub async fn create_module(&self, editor: Editor, input: ModuleInput) -> Result<Module> {
        input.validate()?;

        let professor_id = match editor {
            Editor::Professor(id) => Some(id),
            Editor::Admin => None,
        };
        let module = CatalogRepository::create_module(
            self.db.write(),
            NewModule {
                title: input.title,
                description: input.description,
                school_level: input.school_level,
                position: input.position,
                professor_id,
            },
        )
        .await?;

        info!(module_id = %module.id, ?editor, "Module created");
        Ok(module)
    }

    pub async fn update_module(&self, editor: Editor, input: ModuleUpdateInput) -> Result<Module> {
        input.validate()?;
        let module = self.owned_module(editor, input.id).await?;

        CatalogRepository::update_module(
            self.db.write(),
            module,
            ModuleChanges {
                title: input.title,
                description: input.description,
                school_level: input.school_level,
                position: input.position,
            },
        )
        .await
    }

    pub async fn delete_module(&self, editor: Editor, module_id: Uuid) -> Result<()> {
        self.owned_module(editor, module_id).await?;
        CatalogRepository::delete_module(self.db.write(), module_id).await?;
        info!(%module_id, ?editor, "Module deleted");
        Ok(())
    }

    pub async fn create_chapter(&self, editor: Editor, input: ChapterInput) -> Result<Chapter> {
        input.validate()?;
        self.owned_module(editor, input.module_id).await?;

        CatalogRepository::create_chapter(
            self.db.write(),
            NewChapter {
                module_id: input.module_id,
                title: input.title,
                position: input.position,
            },
        )
        .await
    }

    pub async fn delete_chapter(&self, editor: Editor, chapter_id: Uuid) -> Result<()> {
        self.owned_chapter(editor, chapter_id).await?;
        CatalogRepository::delete_chapter(self.db.write(), chapter_id).await?;
        Ok(())
    }

    pub async fn create_sheet(&self, editor: Editor, input: SheetInput) -> Result<Sheet> {
        input.validate()?;
        self.owned_chapter(editor, input.chapter_id).await?;

        CatalogRepository::create_sheet(
            self.db.write(),
            NewSheet {
                chapter_id: input.chapter_id,
                title: input.title,
                kind: input.kind,
                content: input.content,
                token_cost: input.token_cost,
                position: input.position,
            },
        )
        .await
    }

    /// Full sheet for its editor, locked or not
    pub async fn edited_sheet(&self, editor: Editor, sheet_id: Uuid) -> Result<Sheet> {
        let sheet = CatalogRepository::get_sheet(self.db.read(), sheet_id).await?;
        self.owned_chapter(editor, sheet.chapter_id).await?;
        Ok(sheet)
    }

    pub async fn update_sheet(&self, editor: Editor, input: SheetUpdateInput) -> Result<Sheet> {
        input.validate()?;
        let sheet = self.edited_sheet(editor, input.id).await?;

        CatalogRepository::update_sheet(
            self.db.write(),
            sheet,
            SheetChanges {
                title: input.title,
                kind: input.kind,
                content: input.content,
                token_cost: input.token_cost,
                position: input.position,
            },
        )
        .await
    }

    pub async fn delete_sheet(&self, editor: Editor, sheet_id: Uuid) -> Result<()> {
        self.edited_sheet(editor, sheet_id).await?;
        CatalogRepository::delete_sheet(self.db.write(), sheet_id).await?;
        Ok(())
    }

    async fn owned_module(&self, editor: Editor, module_id: Uuid) -> Result<Module> {
        let module = CatalogRepository::get_module(self.db.read(), module_id).await?;
        match editor {
            Editor::Admin => Ok(module),
            Editor::Professor(id) if module.professor_id == Some(id) => Ok(module),
            Editor::Professor(_) => Err(AppError::UnauthorizedAccess {
                message: "This module belongs to another professor".to_string(),
            }),
        }
    }

    async fn owned_chapter(&self, editor: Editor, chapter_id: Uuid) -> Result<Chapter> {
        let chapter = CatalogRepository::get_chapter(self.db.read(), chapter_id).await?;
        self.owned_module(editor, chapter.module_id).await?;
        Ok(chapter)
    }
}
