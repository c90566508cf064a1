//! User repository

use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub school_level: Option<String>,
}

/// Profile fields a user may edit; `None` leaves the column unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub school_level: Option<String>,
}

pub struct UserRepository;

impl UserRepository {
    pub async fn create<C: ConnectionTrait>(db: &C, new_user: NewUser) -> Result<User> {
        let now = Utc::now();

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(new_user.email.to_lowercase()),
            phone: Set(None),
            password_hash: Set(new_user.password_hash),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            role: Set(new_user.role.into()),
            parent_id: Set(None),
            school_level: Set(new_user.school_level),
            email_verified: Set(false),
            phone_verified: Set(false),
            stripe_customer_id: Set(None),
            onboarding_completed: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        user.insert(db).await.map_err(Into::into)
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id).one(db).await.map_err(Into::into)
    }

    /// Like `find_by_id` but a missing row is an error
    pub async fn get<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<User> {
        Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| AppError::UserNotFound { id: id.to_string() })
    }

    pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email.to_lowercase()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_phone<C: ConnectionTrait>(db: &C, phone: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Phone.eq(phone))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_stripe_customer<C: ConnectionTrait>(
        db: &C,
        customer_id: &str,
    ) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::StripeCustomerId.eq(customer_id))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Students attached to a parent, oldest first
    pub async fn list_children<C: ConnectionTrait>(db: &C, parent_id: Uuid) -> Result<Vec<User>> {
        UserEntity::find()
            .filter(UserColumn::ParentId.eq(parent_id))
            .order_by_asc(UserColumn::CreatedAt)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub async fn set_parent<C: ConnectionTrait>(
        db: &C,
        user: User,
        parent_id: Option<Uuid>,
    ) -> Result<User> {
        let mut active = user.into_active_model();
        active.parent_id = Set(parent_id);
        active.updated_at = Set(Utc::now().into());
        active.update(db).await.map_err(Into::into)
    }

    pub async fn set_phone<C: ConnectionTrait>(db: &C, user: User, phone: String) -> Result<User> {
        let changed = user.phone.as_deref() != Some(phone.as_str());
        let mut active = user.into_active_model();
        active.phone = Set(Some(phone));
        if changed {
            active.phone_verified = Set(false);
        }
        active.updated_at = Set(Utc::now().into());
        active.update(db).await.map_err(Into::into)
    }

    pub async fn mark_email_verified<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<User> {
        let mut active = Self::get(db, user_id).await?.into_active_model();
        active.email_verified = Set(true);
        active.updated_at = Set(Utc::now().into());
        active.update(db).await.map_err(Into::into)
    }

    pub async fn mark_phone_verified<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<User> {
        let mut active = Self::get(db, user_id).await?.into_active_model();
        active.phone_verified = Set(true);
        active.updated_at = Set(Utc::now().into());
        active.update(db).await.map_err(Into::into)
    }

    pub async fn set_stripe_customer<C: ConnectionTrait>(
        db: &C,
        user: User,
        customer_id: String,
    ) -> Result<User> {
        let mut active = user.into_active_model();
        active.stripe_customer_id = Set(Some(customer_id));
        active.updated_at = Set(Utc::now().into());
        active.update(db).await.map_err(Into::into)
    }

    pub async fn complete_onboarding<C: ConnectionTrait>(db: &C, user: User) -> Result<User> {
        let mut active = user.into_active_model();
        active.onboarding_completed = Set(true);
        active.updated_at = Set(Utc::now().into());
        active.update(db).await.map_err(Into::into)
    }

    pub async fn update_profile<C: ConnectionTrait>(
        db: &C,
        user: User,
        changes: ProfileChanges,
    ) -> Result<User> {
        let mut active = user.into_active_model();
        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(level) = changes.school_level {
            active.school_level = Set(Some(level));
        }
        active.updated_at = Set(Utc::now().into());
        active.update(db).await.map_err(Into::into)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool> {
        let result = UserEntity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::is_unique_violation;
    use crate::test_utils::{create_test_user, setup_test_db};

    #[tokio::test]
    async fn test_create_and_find_by_email_is_case_insensitive() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "Alice@Example.com", Role::Student)
            .await
            .unwrap();

        assert_eq!(user.email, "alice@example.com");
        let found = UserRepository::find_by_email(pool.read(), "ALICE@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert!(!found.email_verified);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let pool = setup_test_db().await.unwrap();
        create_test_user(pool.write(), "dup@example.com", Role::Parent).await.unwrap();

        let err = create_test_user(pool.write(), "dup@example.com", Role::Parent)
            .await
            .unwrap_err();
        match err {
            AppError::Database(db_err) => assert!(is_unique_violation(&db_err)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_children_follow_parent_link() {
        let pool = setup_test_db().await.unwrap();
        let parent = create_test_user(pool.write(), "mum@example.com", Role::Parent).await.unwrap();
        let child = create_test_user(pool.write(), "kid@example.com", Role::Student).await.unwrap();

        UserRepository::set_parent(pool.write(), child.clone(), Some(parent.id))
            .await
            .unwrap();
        let children = UserRepository::list_children(pool.read(), parent.id).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, child.id);

        // Deleting the parent detaches the child
        UserRepository::delete(pool.write(), parent.id).await.unwrap();
        let child = UserRepository::get(pool.read(), child.id).await.unwrap();
        assert_eq!(child.parent_id, None);
    }

    #[tokio::test]
    async fn test_changing_phone_resets_verification() {
        let pool = setup_test_db().await.unwrap();
        let user = create_test_user(pool.write(), "p@example.com", Role::Student).await.unwrap();

        let user = UserRepository::set_phone(pool.write(), user, "+33600000001".into())
            .await
            .unwrap();
        let user = UserRepository::mark_phone_verified(pool.write(), user.id).await.unwrap();
        assert!(user.phone_verified);

        let same = UserRepository::set_phone(pool.write(), user, "+33600000001".into())
            .await
            .unwrap();
        assert!(same.phone_verified);

        let changed = UserRepository::set_phone(pool.write(), same, "+33600000002".into())
            .await
            .unwrap();
        assert!(!changed.phone_verified);
    }

    #[tokio::test]
    async fn test_get_missing_user() {
        let pool = setup_test_db().await.unwrap();
        let err = UserRepository::get(pool.read(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::UserNotFound { .. }));
    }
}
