//! Account, verification and family inputs

use super::{validate_digits, validate_phone};
use crate::db::models::Role;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(email, length(max = 254))]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(min = 1, max = 64))]
    pub first_name: String,

    #[validate(length(min = 1, max = 64))]
    pub last_name: String,

    pub role: Role,

    #[validate(length(min = 1, max = 32))]
    pub school_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Professor account created from the backoffice
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorInput {
    #[validate(email, length(max = 254))]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(min = 1, max = 64))]
    pub first_name: String,

    #[validate(length(min = 1, max = 64))]
    pub last_name: String,

    #[validate(length(min = 1, max = 64))]
    pub subject: String,

    #[validate(length(max = 2000))]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 64))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub last_name: Option<String>,

    #[validate(length(min = 1, max = 32))]
    pub school_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PhoneInput {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyCodeInput {
    #[validate(length(min = 4, max = 10), custom(function = "validate_digits"))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LinkChildInput {
    #[validate(email)]
    pub child_email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChildInput {
    pub child_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferTokensInput {
    pub child_id: Uuid,

    #[validate(range(min = 1, max = 10000))]
    pub amount: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register() -> RegisterInput {
        RegisterInput {
            email: "lea@example.com".into(),
            password: "longenough".into(),
            first_name: "Lea".into(),
            last_name: "Martin".into(),
            role: Role::Student,
            school_level: Some("seconde".into()),
        }
    }

    #[test]
    fn test_register_valid() {
        assert!(register().validate().is_ok());
    }

    #[test]
    fn test_register_rejects_short_password() {
        let input = RegisterInput {
            password: "short".into(),
            ..register()
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_register_rejects_bad_email_and_empty_name() {
        let input = RegisterInput {
            email: "not-an-email".into(),
            first_name: String::new(),
            ..register()
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("first_name"));
    }

    #[test]
    fn test_register_deserializes_camel_case() {
        let input: RegisterInput = serde_json::from_value(serde_json::json!({
            "email": "a@b.fr",
            "password": "password123",
            "firstName": "A",
            "lastName": "B",
            "role": "parent"
        }))
        .unwrap();
        assert_eq!(input.role, Role::Parent);
        assert!(input.school_level.is_none());
    }

    #[test]
    fn test_verify_code_input() {
        assert!(VerifyCodeInput { code: "123456".into() }.validate().is_ok());
        assert!(VerifyCodeInput { code: "12345a".into() }.validate().is_err());
        assert!(VerifyCodeInput { code: "12".into() }.validate().is_err());
    }

    #[test]
    fn test_phone_input() {
        assert!(PhoneInput { phone: "+33612345678".into() }.validate().is_ok());
        assert!(PhoneInput { phone: "06 12 34 56 78".into() }.validate().is_err());
    }
}
