//! Error types for Tutorly services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidFormat,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidCredentials,
    ExpiredToken,

    // Authorization errors (3xxx)
    UnauthorizedAccess,
    InvalidParent,
    InvalidUser,

    // Resource errors (4xxx)
    NotFound,
    UserNotFound,
    SheetNotFound,
    PlanNotFound,

    // Conflict errors (5xxx)
    Conflict,
    EmailAlreadyUsed,

    // Business rule errors (6xxx)
    RateLimited,
    InsufficientTokens,
    InvalidPromotionalCode,
    InvalidVerificationCode,
    VerificationCodeExpired,
    TooManyAttempts,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,
    MigrationError,

    // External service errors (8xxx)
    ExternalServiceUnavailable,
    PaymentProviderError,
    InvalidWebhookSignature,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1002,

            // Auth (2xxx)
            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidCredentials => 2002,
            ErrorCode::ExpiredToken => 2003,

            // Authz (3xxx)
            ErrorCode::UnauthorizedAccess => 3001,
            ErrorCode::InvalidParent => 3002,
            ErrorCode::InvalidUser => 3003,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::UserNotFound => 4002,
            ErrorCode::SheetNotFound => 4003,
            ErrorCode::PlanNotFound => 4004,

            // Conflicts (5xxx)
            ErrorCode::Conflict => 5001,
            ErrorCode::EmailAlreadyUsed => 5002,

            // Business rules (6xxx)
            ErrorCode::RateLimited => 6001,
            ErrorCode::InsufficientTokens => 6002,
            ErrorCode::InvalidPromotionalCode => 6003,
            ErrorCode::InvalidVerificationCode => 6004,
            ErrorCode::VerificationCodeExpired => 6005,
            ErrorCode::TooManyAttempts => 6006,

            // Database (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,
            ErrorCode::MigrationError => 7003,

            // External (8xxx)
            ErrorCode::ExternalServiceUnavailable => 8001,
            ErrorCode::PaymentProviderError => 8002,
            ErrorCode::InvalidWebhookSignature => 8003,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Unauthorized access: {message}")]
    UnauthorizedAccess { message: String },

    #[error("Invalid parent: {message}")]
    InvalidParent { message: String },

    #[error("Invalid user: {message}")]
    InvalidUser { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("User not found: {id}")]
    UserNotFound { id: String },

    #[error("Sheet not found: {id}")]
    SheetNotFound { id: String },

    #[error("Subscription plan not found: {code}")]
    PlanNotFound { code: String },

    // Conflict errors
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Email already in use: {email}")]
    EmailAlreadyUsed { email: String },

    // Business rules
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    #[error("Insufficient tokens: {required} required, {available} available")]
    InsufficientTokens { required: i64, available: i64 },

    #[error("Invalid promotional code: {code}")]
    InvalidPromotionalCode { code: String },

    #[error("Invalid verification code")]
    InvalidVerificationCode,

    #[error("Verification code expired")]
    VerificationCodeExpired,

    #[error("Too many verification attempts")]
    TooManyAttempts,

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Migration error: {message}")]
    Migration { message: String },

    // External service errors
    #[error("External service unavailable: {service}: {message}")]
    ExternalServiceUnavailable { service: String, message: String },

    #[error("Payment provider error: {message}")]
    PaymentProvider { message: String },

    #[error("Invalid webhook signature")]
    InvalidWebhookSignature,

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::UnauthorizedAccess { .. } => ErrorCode::UnauthorizedAccess,
            AppError::InvalidParent { .. } => ErrorCode::InvalidParent,
            AppError::InvalidUser { .. } => ErrorCode::InvalidUser,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::UserNotFound { .. } => ErrorCode::UserNotFound,
            AppError::SheetNotFound { .. } => ErrorCode::SheetNotFound,
            AppError::PlanNotFound { .. } => ErrorCode::PlanNotFound,
            AppError::Conflict { .. } => ErrorCode::Conflict,
            AppError::EmailAlreadyUsed { .. } => ErrorCode::EmailAlreadyUsed,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::InsufficientTokens { .. } => ErrorCode::InsufficientTokens,
            AppError::InvalidPromotionalCode { .. } => ErrorCode::InvalidPromotionalCode,
            AppError::InvalidVerificationCode => ErrorCode::InvalidVerificationCode,
            AppError::VerificationCodeExpired => ErrorCode::VerificationCodeExpired,
            AppError::TooManyAttempts => ErrorCode::TooManyAttempts,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Migration { .. } => ErrorCode::MigrationError,
            AppError::ExternalServiceUnavailable { .. } => ErrorCode::ExternalServiceUnavailable,
            AppError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
            AppError::InvalidWebhookSignature => ErrorCode::InvalidWebhookSignature,
            AppError::HttpClient(_) => ErrorCode::ExternalServiceUnavailable,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidFormat { .. }
            | AppError::InvalidWebhookSignature
            | AppError::InvalidVerificationCode
            | AppError::VerificationCodeExpired => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. }
            | AppError::InvalidCredentials
            | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 402 Payment Required
            AppError::InsufficientTokens { .. } => StatusCode::PAYMENT_REQUIRED,

            // 403 Forbidden
            AppError::UnauthorizedAccess { .. }
            | AppError::InvalidParent { .. }
            | AppError::InvalidUser { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::UserNotFound { .. }
            | AppError::SheetNotFound { .. }
            | AppError::PlanNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict { .. } | AppError::EmailAlreadyUsed { .. } => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            AppError::InvalidPromotionalCode { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 429 Too Many Requests
            AppError::RateLimited { .. } | AppError::TooManyAttempts => {
                StatusCode::TOO_MANY_REQUESTS
            }

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Migration { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::PaymentProvider { .. } | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::ExternalServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Field that caused the error, when known
    pub fn field(&self) -> Option<&str> {
        match self {
            AppError::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Shorthand for a not-found error on an arbitrary resource
    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Shorthand for an external service outage
    pub fn unavailable(service: &str, message: impl ToString) -> Self {
        AppError::ExternalServiceUnavailable {
            service: service.to_string(),
            message: message.to_string(),
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = self
            .field()
            .map(|field| serde_json::json!({ "field": field }));

        // Internal details never leave the server
        let message = if self.is_server_error() && !matches!(self, AppError::ExternalServiceUnavailable { .. }) {
            "Internal server error".to_string()
        } else {
            message
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                status: status.as_u16(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: errors.to_string(),
            field,
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Migration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::SheetNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::SheetNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_family_errors_are_forbidden() {
        let parent = AppError::InvalidParent { message: "not a parent".into() };
        let user = AppError::InvalidUser { message: "not a student".into() };
        assert_eq!(parent.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(user.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(parent.code().as_code(), 3002);
        assert_eq!(user.code().as_code(), 3003);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Invalid email".into(),
            field: Some("email".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.field(), Some("email"));
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
    }

    #[test]
    fn test_external_service_unavailable() {
        let err = AppError::unavailable("sms", "timeout");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), ErrorCode::ExternalServiceUnavailable);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_insufficient_tokens() {
        let err = AppError::InsufficientTokens { required: 5, available: 2 };
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(err.to_string(), "Insufficient tokens: 5 required, 2 available");
    }

    #[test]
    fn test_server_error() {
        let err = AppError::DatabaseConnection {
            message: "refused".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), ErrorCode::ConnectionError);
        assert!(err.is_server_error());
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::InvalidParent).unwrap();
        assert_eq!(json, "\"INVALID_PARENT\"");
    }
}
