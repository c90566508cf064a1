//! Professor repository

use crate::db::models::*;
use crate::errors::{AppError, Result};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewProfessor {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub subject: String,
    pub bio: Option<String>,
}

pub struct ProfessorRepository;

impl ProfessorRepository {
    pub async fn create<C: ConnectionTrait>(db: &C, new: NewProfessor) -> Result<Professor> {
        let now = Utc::now();

        let professor = ProfessorActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(new.email.to_lowercase()),
            password_hash: Set(new.password_hash),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            subject: Set(new.subject),
            bio: Set(new.bio),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        professor.insert(db).await.map_err(Into::into)
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Professor>> {
        ProfessorEntity::find_by_id(id).one(db).await.map_err(Into::into)
    }

    pub async fn get<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Professor> {
        Self::find_by_id(db, id)
            .await?
            .ok_or_else(|| AppError::not_found("professor", id))
    }

    pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<Professor>> {
        ProfessorEntity::find()
            .filter(ProfessorColumn::Email.eq(email.to_lowercase()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub async fn list_active<C: ConnectionTrait>(db: &C) -> Result<Vec<Professor>> {
        ProfessorEntity::find()
            .filter(ProfessorColumn::IsActive.eq(true))
            .order_by_asc(ProfessorColumn::LastName)
            .all(db)
            .await
            .map_err(Into::into)
    }
}
