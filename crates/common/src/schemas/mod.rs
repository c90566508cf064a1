//! Request schemas shared by every RPC procedure
//!
//! Each input is a `validator` derive; `AppError` converts from
//! `ValidationErrors`, so handlers call `input.validate()?`.

mod account;
mod billing;
mod catalog;
mod content;

pub use account::*;
pub use billing::*;
pub use catalog::*;
pub use content::*;

use serde::Deserialize;
use std::borrow::Cow;
use std::sync::OnceLock;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Input of procedures addressing a single record
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdInput {
    pub id: Uuid,
}

fn phone_pattern() -> &'static regex_lite::Regex {
    static PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex_lite::Regex::new(r"^\+[1-9][0-9]{7,14}$").expect("phone pattern compiles")
    })
}

/// E.164 phone number: `+` then 8 to 15 digits
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone_pattern().is_match(phone) {
        Ok(())
    } else {
        Err(invalid("phone", "phone number must be in E.164 format, e.g. +33612345678"))
    }
}

/// Verification codes are digits only
pub fn validate_digits(code: &str) -> Result<(), ValidationError> {
    if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid("digits", "code must contain only digits"))
    }
}

/// Upper-case letters, digits, `-` and `_`
pub fn validate_promo_code(code: &str) -> Result<(), ValidationError> {
    if code
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        Ok(())
    } else {
        Err(invalid("promo_code", "code may contain letters, digits, '-' and '_'"))
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_format() {
        assert!(validate_phone("+33612345678").is_ok());
        assert!(validate_phone("+14155550100").is_ok());
        assert!(validate_phone("0612345678").is_err());
        assert!(validate_phone("+0612345678").is_err());
        assert!(validate_phone("+33 6 12 34 56 78").is_err());
    }

    #[test]
    fn test_digits() {
        assert!(validate_digits("004213").is_ok());
        assert!(validate_digits("12a456").is_err());
        assert!(validate_digits("").is_err());
    }

    #[test]
    fn test_promo_code_charset() {
        assert!(validate_promo_code("RENTREE-2024").is_ok());
        assert!(validate_promo_code("no spaces").is_err());
    }
}
