//! Subscription entity mirrored from Stripe

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::SubscriptionStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    pub plan_id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub stripe_subscription_id: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub current_period_end: Option<DateTimeWithTimeZone>,

    pub cancel_at_period_end: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn status(&self) -> SubscriptionStatus {
        self.status.parse().unwrap_or(SubscriptionStatus::Incomplete)
    }

    /// Whether the subscription still grants access
    pub fn is_live(&self) -> bool {
        matches!(
            self.status(),
            SubscriptionStatus::Active | SubscriptionStatus::PastDue
        )
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(
        belongs_to = "super::subscription_plan::Entity",
        from = "Column::PlanId",
        to = "super::subscription_plan::Column::Id"
    )]
    Plan,

    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::subscription_plan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
