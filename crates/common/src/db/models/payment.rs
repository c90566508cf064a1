//! One-off payment entity (Stripe payment intents)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::PaymentStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub stripe_payment_intent_id: String,

    pub amount_cents: i64,

    #[sea_orm(column_type = "Text")]
    pub currency: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub promotional_code_id: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn status(&self) -> PaymentStatus {
        self.status.parse().unwrap_or(PaymentStatus::Pending)
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
        belongs_to = "super::promotional_code::Entity",
        from = "Column::PromotionalCodeId",
        to = "super::promotional_code::Column::Id",
        on_delete = "SetNull"
    )]
    PromotionalCode,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::promotional_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromotionalCode.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
