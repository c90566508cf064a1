//! Sheet entity: a lesson, exercise set or summary inside a chapter

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::SheetKind;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sheets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub chapter_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub kind: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Tokens needed to unlock; zero means free
    pub token_cost: i32,

    pub position: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn kind(&self) -> SheetKind {
        self.kind.parse().unwrap_or(SheetKind::Lesson)
    }

    pub fn is_free(&self) -> bool {
        self.token_cost <= 0
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chapter::Entity",
        from = "Column::ChapterId",
        to = "super::chapter::Column::Id",
        on_delete = "Cascade"
    )]
    Chapter,

    #[sea_orm(has_many = "super::sheet_unlock::Entity")]
    Unlocks,
}

impl Related<super::chapter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chapter.def()
    }
}

impl Related<super::sheet_unlock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Unlocks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
