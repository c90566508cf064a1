//! Authentication and authorization utilities
//!
//! Provides:
//! - Password hashing (argon2, PHC strings)
//! - JWT token generation and validation with role claims
//! - `AuthContext` extraction from `Authorization: Bearer`
//! - Verification code generation and hashing

use crate::db::models::Role;
use crate::errors::{AppError, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Role carried in a token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthRole {
    Student,
    Parent,
    Professor,
    Admin,
}

impl AuthRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthRole::Student => "student",
            AuthRole::Parent => "parent",
            AuthRole::Professor => "professor",
            AuthRole::Admin => "admin",
        }
    }
}

impl fmt::Display for AuthRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Role> for AuthRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Student => AuthRole::Student,
            Role::Parent => AuthRole::Parent,
        }
    }
}

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User or professor id
    pub subject_id: Uuid,

    pub role: AuthRole,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    /// Fail with `UnauthorizedAccess` unless the caller has one of `roles`.
    /// Admins pass every check.
    pub fn require_role(&self, roles: &[AuthRole]) -> Result<()> {
        if self.role == AuthRole::Admin || roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::UnauthorizedAccess {
                message: format!("{} accounts cannot perform this action", self.role),
            })
        }
    }

    /// Student or parent account
    pub fn require_user(&self) -> Result<Uuid> {
        self.require_role(&[AuthRole::Student, AuthRole::Parent])?;
        Ok(self.subject_id)
    }

    pub fn require_professor(&self) -> Result<Uuid> {
        self.require_role(&[AuthRole::Professor])?;
        Ok(self.subject_id)
    }

    pub fn require_admin(&self) -> Result<()> {
        self.require_role(&[])
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user or professor ID)
    pub sub: String,

    pub role: AuthRole,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, subject_id: Uuid, role: AuthRole) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: subject_id.to_string(),
            role,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid token".to_string(),
                },
            })
    }
}

/// Hash a password into a PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| AppError::Internal {
        message: format!("Stored password hash is malformed: {}", e),
    })?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal {
            message: format!("Password verification failed: {}", e),
        }),
    }
}

/// Random numeric code of `length` digits
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Hash a verification code for storage
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two hashes without short-circuiting on the first difference
pub fn hashes_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Extract the token from an Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Expected a Bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;

        let subject_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: "Invalid token subject".to_string(),
        })?;

        Ok(AuthContext {
            subject_id,
            role: claims.role,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_generate_code() {
        let code = generate_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_hash_code() {
        assert_eq!(hash_code("123456"), hash_code(" 123456 "));
        assert_ne!(hash_code("123456"), hash_code("123457"));
        assert!(hashes_match(&hash_code("42"), &hash_code("42")));
        assert!(!hashes_match(&hash_code("42"), &hash_code("43")));
        assert!(!hashes_match("abc", "ab"));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let user_id = Uuid::new_v4();

        let token = manager.generate_token(user_id, AuthRole::Parent).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, AuthRole::Parent);
    }

    #[test]
    fn test_jwt_wrong_secret_rejected() {
        let token = JwtManager::new("a", 3600)
            .generate_token(Uuid::new_v4(), AuthRole::Student)
            .unwrap();
        let err = JwtManager::new("b", 3600).validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }

    #[test]
    fn test_require_role() {
        let ctx = AuthContext {
            subject_id: Uuid::new_v4(),
            role: AuthRole::Student,
            request_id: "r".into(),
        };
        assert!(ctx.require_user().is_ok());
        assert!(matches!(
            ctx.require_professor().unwrap_err(),
            AppError::UnauthorizedAccess { .. }
        ));
        assert!(ctx.require_admin().is_err());

        let admin = AuthContext {
            role: AuthRole::Admin,
            ..ctx
        };
        assert!(admin.require_professor().is_ok());
        assert!(admin.require_admin().is_ok());
    }
}
