//! FAQ and past paper inputs

use crate::db::models::FaqAudience;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FaqInput {
    pub audience: FaqAudience,

    #[validate(length(min = 1, max = 500))]
    pub question: String,

    #[validate(length(min = 1, max = 10000))]
    pub answer: String,

    #[serde(default)]
    pub position: i32,

    #[serde(default = "default_published")]
    pub is_published: bool,
}

fn default_published() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FaqQuery {
    pub audience: FaqAudience,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PastPaperInput {
    pub module_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(range(min = 1990, max = 2100))]
    pub year: i32,

    #[validate(length(min = 1, max = 32))]
    pub school_level: String,

    #[validate(url)]
    pub file_url: String,

    #[validate(url)]
    pub correction_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PastPaperQuery {
    pub module_id: Option<Uuid>,

    #[validate(length(min = 1, max = 32))]
    pub school_level: Option<String>,

    #[validate(range(min = 1990, max = 2100))]
    pub year: Option<i32>,
}
