//! Subscription plan entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::BillingInterval;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscription_plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Stable lookup key used by the front-ends (`monthly`, `yearly`, ...)
    #[sea_orm(column_type = "Text", unique)]
    pub code: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text", unique)]
    pub stripe_price_id: String,

    pub price_cents: i64,

    #[sea_orm(column_type = "Text")]
    pub currency: String,

    #[sea_orm(column_type = "Text")]
    pub billing_interval: String,

    /// Tokens credited every time an invoice of this plan is paid
    pub tokens_per_period: i32,

    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn interval(&self) -> BillingInterval {
        self.billing_interval.parse().unwrap_or(BillingInterval::Month)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscriptions,
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
