//! Catalog inputs for professors and browsing

use crate::db::models::SheetKind;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,

    #[validate(length(min = 1, max = 32))]
    pub school_level: String,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUpdateInput {
    pub id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 32))]
    pub school_level: Option<String>,

    #[validate(range(min = 0))]
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChapterInput {
    pub module_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SheetInput {
    pub chapter_id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    pub kind: SheetKind,

    #[validate(length(min = 1, max = 200000))]
    pub content: String,

    #[serde(default)]
    #[validate(range(min = 0, max = 1000))]
    pub token_cost: i32,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SheetUpdateInput {
    pub id: Uuid,

    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    pub kind: Option<SheetKind>,

    #[validate(length(min = 1, max = 200000))]
    pub content: Option<String>,

    #[validate(range(min = 0, max = 1000))]
    pub token_cost: Option<i32>,

    #[validate(range(min = 0))]
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModuleQuery {
    #[validate(length(min = 1, max = 32))]
    pub school_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_cost_bounds() {
        let input: SheetInput = serde_json::from_value(serde_json::json!({
            "chapterId": Uuid::new_v4(),
            "title": "Exercices",
            "kind": "exercise",
            "content": "...",
            "tokenCost": -1
        }))
        .unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("token_cost"));
    }

    #[test]
    fn test_unknown_sheet_kind_rejected() {
        let parsed = serde_json::from_value::<SheetInput>(serde_json::json!({
            "chapterId": Uuid::new_v4(),
            "title": "T",
            "kind": "video",
            "content": "c"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_module_defaults() {
        let input: ModuleInput = serde_json::from_value(serde_json::json!({
            "title": "Physique",
            "schoolLevel": "premiere"
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.position, 0);
        assert!(input.description.is_empty());
    }
}
