//! FAQ entry entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "faqs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// `student`, `parent`, `professor` or `all`
    #[sea_orm(column_type = "Text")]
    pub audience: String,

    #[sea_orm(column_type = "Text")]
    pub question: String,

    #[sea_orm(column_type = "Text")]
    pub answer: String,

    pub position: i32,

    pub is_published: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
