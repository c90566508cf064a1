//! User entity (students and parents)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[sea_orm(column_type = "Text", nullable, unique)]
    pub phone: Option<String>,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text")]
    pub password_hash: String,

    #[sea_orm(column_type = "Text")]
    pub first_name: String,

    #[sea_orm(column_type = "Text")]
    pub last_name: String,

    /// `student` or `parent`
    #[sea_orm(column_type = "Text")]
    pub role: String,

    /// Parent account a student is attached to
    pub parent_id: Option<Uuid>,

    #[sea_orm(column_type = "Text", nullable)]
    pub school_level: Option<String>,

    pub email_verified: bool,

    pub phone_verified: bool,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub stripe_customer_id: Option<String>,

    pub onboarding_completed: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::Student)
    }

    pub fn is_parent(&self) -> bool {
        self.role() == Role::Parent
    }

    pub fn is_student(&self) -> bool {
        self.role() == Role::Student
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_delete = "SetNull"
    )]
    Parent,

    #[sea_orm(has_one = "super::token_balance::Entity")]
    TokenBalance,

    #[sea_orm(has_many = "super::subscription::Entity")]
    Subscriptions,

    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,

    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,

    #[sea_orm(has_many = "super::sheet_unlock::Entity")]
    SheetUnlocks,
}

impl Related<super::token_balance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TokenBalance.def()
    }
}

impl Related<super::subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl Related<super::sheet_unlock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SheetUnlocks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
