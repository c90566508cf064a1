//! Billing inputs

use super::validate_promo_code;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInput {
    #[validate(length(min = 1, max = 64))]
    pub plan_code: String,

    #[validate(length(min = 3, max = 32), custom(function = "validate_promo_code"))]
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PromoCodeInput {
    #[validate(length(min = 3, max = 32), custom(function = "validate_promo_code"))]
    pub code: String,

    #[validate(range(min = 1, max = 100))]
    pub percent_off: Option<i32>,

    #[serde(default)]
    #[validate(range(min = 0, max = 10000))]
    pub bonus_tokens: i32,

    #[validate(range(min = 1))]
    pub max_redemptions: Option<i32>,

    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PromoCheckInput {
    #[validate(length(min = 3, max = 32), custom(function = "validate_promo_code"))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrantInput {
    pub user_id: uuid::Uuid,

    #[validate(range(min = 1, max = 100000))]
    pub amount: i64,
}
