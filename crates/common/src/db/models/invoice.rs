//! Invoice entity mirrored from Stripe

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::InvoiceStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    pub subscription_id: Option<Uuid>,

    #[sea_orm(column_type = "Text", unique)]
    pub stripe_invoice_id: String,

    pub amount_cents: i64,

    #[sea_orm(column_type = "Text")]
    pub currency: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub hosted_url: Option<String>,

    pub issued_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn status(&self) -> InvoiceStatus {
        self.status.parse().unwrap_or(InvoiceStatus::Open)
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
        belongs_to = "super::subscription::Entity",
        from = "Column::SubscriptionId",
        to = "super::subscription::Column::Id",
        on_delete = "SetNull"
    )]
    Subscription,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
