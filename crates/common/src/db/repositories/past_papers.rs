//! Past paper repository

use crate::db::models::*;
use crate::errors::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewPastPaper {
    pub module_id: Option<Uuid>,
    pub title: String,
    pub year: i32,
    pub school_level: String,
    pub file_url: String,
    pub correction_url: Option<String>,
}

/// Optional filters; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct PastPaperFilter {
    pub module_id: Option<Uuid>,
    pub school_level: Option<String>,
    pub year: Option<i32>,
}

pub struct PastPaperRepository;

impl PastPaperRepository {
    pub async fn create<C: ConnectionTrait>(db: &C, new: NewPastPaper) -> Result<PastPaper> {
        let paper = PastPaperActiveModel {
            id: Set(Uuid::new_v4()),
            module_id: Set(new.module_id),
            title: Set(new.title),
            year: Set(new.year),
            school_level: Set(new.school_level),
            file_url: Set(new.file_url),
            correction_url: Set(new.correction_url),
            created_at: Set(Utc::now().into()),
        };

        paper.insert(db).await.map_err(Into::into)
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<PastPaper>> {
        PastPaperEntity::find_by_id(id).one(db).await.map_err(Into::into)
    }

    /// Most recent papers first
    pub async fn list<C: ConnectionTrait>(db: &C, filter: PastPaperFilter) -> Result<Vec<PastPaper>> {
        let condition = Condition::all()
            .add_option(filter.module_id.map(|id| PastPaperColumn::ModuleId.eq(id)))
            .add_option(filter.school_level.map(|level| PastPaperColumn::SchoolLevel.eq(level)))
            .add_option(filter.year.map(|year| PastPaperColumn::Year.eq(year)));

        PastPaperEntity::find()
            .filter(condition)
            .order_by_desc(PastPaperColumn::Year)
            .order_by_asc(PastPaperColumn::Title)
            .all(db)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    fn paper(title: &str, year: i32, level: &str) -> NewPastPaper {
        NewPastPaper {
            module_id: None,
            title: title.to_string(),
            year,
            school_level: level.to_string(),
            file_url: format!("https://cdn.tutorly.app/papers/{title}.pdf"),
            correction_url: None,
        }
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_by_year() {
        let pool = setup_test_db().await.unwrap();
        let db = pool.write();
        PastPaperRepository::create(db, paper("maths-2021", 2021, "terminale")).await.unwrap();
        PastPaperRepository::create(db, paper("maths-2023", 2023, "terminale")).await.unwrap();
        PastPaperRepository::create(db, paper("brevet-2023", 2023, "troisieme")).await.unwrap();

        let all = PastPaperRepository::list(pool.read(), PastPaperFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].year, 2023);

        let terminale = PastPaperRepository::list(
            pool.read(),
            PastPaperFilter {
                school_level: Some("terminale".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let titles: Vec<_> = terminale.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["maths-2023", "maths-2021"]);

        let in_2023 = PastPaperRepository::list(
            pool.read(),
            PastPaperFilter {
                year: Some(2023),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(in_2023.len(), 2);
    }
}
