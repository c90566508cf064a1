//! FAQ repository

use crate::db::models::*;
use crate::errors::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewFaq {
    pub audience: FaqAudience,
    pub question: String,
    pub answer: String,
    pub position: i32,
    pub is_published: bool,
}

pub struct FaqRepository;

impl FaqRepository {
    pub async fn create<C: ConnectionTrait>(db: &C, new: NewFaq) -> Result<Faq> {
        let faq = FaqActiveModel {
            id: Set(Uuid::new_v4()),
            audience: Set(new.audience.into()),
            question: Set(new.question),
            answer: Set(new.answer),
            position: Set(new.position),
            is_published: Set(new.is_published),
            created_at: Set(Utc::now().into()),
        };

        faq.insert(db).await.map_err(Into::into)
    }

    /// Published entries for an audience, including entries shared with everyone
    pub async fn list_for<C: ConnectionTrait>(db: &C, audience: FaqAudience) -> Result<Vec<Faq>> {
        FaqEntity::find()
            .filter(FaqColumn::IsPublished.eq(true))
            .filter(FaqColumn::Audience.is_in([audience.as_str(), FaqAudience::All.as_str()]))
            .order_by_asc(FaqColumn::Position)
            .order_by_asc(FaqColumn::CreatedAt)
            .all(db)
            .await
            .map_err(Into::into)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<bool> {
        let result = FaqEntity::delete_by_id(id).exec(db).await?;
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    fn entry(audience: FaqAudience, position: i32, published: bool) -> NewFaq {
        NewFaq {
            audience,
            question: format!("{audience} question {position}"),
            answer: "answer".to_string(),
            position,
            is_published: published,
        }
    }

    #[tokio::test]
    async fn test_list_for_audience_includes_shared_entries() {
        let pool = setup_test_db().await.unwrap();
        let db = pool.write();
        FaqRepository::create(db, entry(FaqAudience::Parent, 2, true)).await.unwrap();
        FaqRepository::create(db, entry(FaqAudience::All, 1, true)).await.unwrap();
        FaqRepository::create(db, entry(FaqAudience::Student, 0, true)).await.unwrap();
        FaqRepository::create(db, entry(FaqAudience::Parent, 3, false)).await.unwrap();

        let faqs = FaqRepository::list_for(pool.read(), FaqAudience::Parent).await.unwrap();
        let positions: Vec<i32> = faqs.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }
}
