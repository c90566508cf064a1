//! Promotional code entity

use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promotional_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Always stored upper-case
    #[sea_orm(column_type = "Text", unique)]
    pub code: String,

    /// Percentage discount on the first invoice
    pub percent_off: Option<i32>,

    /// Tokens credited on redemption
    pub bonus_tokens: i32,

    pub max_redemptions: Option<i32>,

    pub redemptions: i32,

    pub expires_at: Option<DateTimeWithTimeZone>,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|expires| expires < Utc::now().fixed_offset())
            .unwrap_or(false)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_redemptions
            .map(|max| self.redemptions >= max)
            .unwrap_or(false)
    }

    /// Active, not expired and not exhausted
    pub fn is_redeemable(&self) -> bool {
        self.is_active && !self.is_expired() && !self.is_exhausted()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
