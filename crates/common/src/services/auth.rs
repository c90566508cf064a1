//! Registration and sign-in

use super::on_unique_violation;
use crate::auth::{hash_password, verify_password, AuthRole, JwtManager};
use crate::db::models::{Professor, User};
use crate::db::repositories::{NewProfessor, NewUser, ProfessorRepository, TokenBalanceRepository, UserRepository};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::schemas::{LoginInput, ProfessorInput, RegisterInput};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfessorSession {
    pub token: String,
    pub expires_in: i64,
    pub role: AuthRole,
    pub professor: Professor,
}

#[derive(Clone)]
pub struct AuthService {
    db: DbPool,
    jwt: Arc<JwtManager>,
    admin_emails: Arc<Vec<String>>,
}

impl AuthService {
    pub fn new(db: DbPool, jwt: Arc<JwtManager>, admin_emails: Vec<String>) -> Self {
        let admin_emails = admin_emails.into_iter().map(|e| e.to_lowercase()).collect();
        Self {
            db,
            jwt,
            admin_emails: Arc::new(admin_emails),
        }
    }

    /// Create a student or parent account with an empty token balance
    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        if UserRepository::find_by_email(self.db.read(), &email).await?.is_some() {
            return Err(AppError::EmailAlreadyUsed { email });
        }

        let password_hash = hash_blocking(input.password).await?;
        let new_user = NewUser {
            email: email.clone(),
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            role: input.role,
            school_level: input.school_level,
        };

        let user = self
            .db
            .unit_of_work()
            .run(move |txn| {
                Box::pin(async move {
                    let user = UserRepository::create(txn, new_user).await?;
                    TokenBalanceRepository::ensure(txn, user.id).await?;
                    Ok(user)
                })
            })
            .await
            .map_err(|e| on_unique_violation(e, || AppError::EmailAlreadyUsed { email: email.clone() }))?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        self.session_for(user)
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthSession> {
        input.validate()?;

        let user = UserRepository::find_by_email(self.db.read(), input.email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_blocking(input.password, user.password_hash.clone()).await? {
            return Err(AppError::InvalidCredentials);
        }

        self.session_for(user)
    }

    /// Sign in a professor; addresses listed in `auth.admin_emails` get the admin role
    pub async fn professor_login(&self, input: LoginInput) -> Result<ProfessorSession> {
        input.validate()?;

        let professor = ProfessorRepository::find_by_email(self.db.read(), input.email.trim())
            .await?
            .filter(|p| p.is_active)
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_blocking(input.password, professor.password_hash.clone()).await? {
            return Err(AppError::InvalidCredentials);
        }

        let role = if self.admin_emails.contains(&professor.email) {
            AuthRole::Admin
        } else {
            AuthRole::Professor
        };

        Ok(ProfessorSession {
            token: self.jwt.generate_token(professor.id, role)?,
            expires_in: self.jwt.expiration_secs(),
            role,
            professor,
        })
    }

    /// Backoffice: create a professor account
    pub async fn create_professor(&self, input: ProfessorInput) -> Result<Professor> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();

        let password_hash = hash_blocking(input.password).await?;
        let professor = ProfessorRepository::create(
            self.db.write(),
            NewProfessor {
                email: email.clone(),
                password_hash,
                first_name: input.first_name,
                last_name: input.last_name,
                subject: input.subject,
                bio: input.bio,
            },
        )
        .await
        .map_err(|e| on_unique_violation(e, || AppError::EmailAlreadyUsed { email }))?;

        info!(professor_id = %professor.id, "Professor created");
        Ok(professor)
    }

    fn session_for(&self, user: User) -> Result<AuthSession> {
        let token = self.jwt.generate_token(user.id, user.role().into())?;
        Ok(AuthSession {
            token,
            expires_in: self.jwt.expiration_secs(),
            user,
        })
    }
}

async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Password hashing task failed: {}", e),
        })?
}

async fn verify_blocking(password: String, stored_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Password verification task failed: {}", e),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Role;
    use crate::test_utils::setup_test_db;

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "motdepasse".to_string(),
            first_name: "Lea".to_string(),
            last_name: "Martin".to_string(),
            role: Role::Student,
            school_level: Some("seconde".to_string()),
        }
    }

    async fn service() -> (AuthService, DbPool) {
        let pool = setup_test_db().await.unwrap();
        let jwt = Arc::new(JwtManager::new("test", 3600));
        (
            AuthService::new(pool.clone(), jwt, vec!["Admin@Tutorly.app".into()]),
            pool,
        )
    }

    #[tokio::test]
    async fn test_register_creates_zero_balance() {
        let (auth, pool) = service().await;

        let session = auth.register(register_input("Lea@Example.com")).await.unwrap();
        assert_eq!(session.user.email, "lea@example.com");
        assert!(!session.token.is_empty());

        let balance = TokenBalanceRepository::find(pool.read(), session.user.id).await.unwrap();
        assert_eq!(balance.map(|b| b.balance), Some(0));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let (auth, _pool) = service().await;
        auth.register(register_input("lea@example.com")).await.unwrap();

        let err = auth.register(register_input("LEA@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::EmailAlreadyUsed { .. }));
        assert_eq!(err.status_code().as_u16(), 409);
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let (auth, _pool) = service().await;
        auth.register(register_input("lea@example.com")).await.unwrap();

        let ok = auth
            .login(LoginInput {
                email: "lea@example.com".into(),
                password: "motdepasse".into(),
            })
            .await;
        assert!(ok.is_ok());

        let err = auth
            .login(LoginInput {
                email: "lea@example.com".into(),
                password: "mauvais".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));

        let err = auth
            .login(LoginInput {
                email: "nobody@example.com".into(),
                password: "motdepasse".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_professor_login_assigns_admin_role() {
        let (auth, _pool) = service().await;
        for email in ["admin@tutorly.app", "prof@tutorly.app"] {
            auth.create_professor(ProfessorInput {
                email: email.into(),
                password: "motdepasse".into(),
                first_name: "Jean".into(),
                last_name: "Dupont".into(),
                subject: "Maths".into(),
                bio: None,
            })
            .await
            .unwrap();
        }

        let admin = auth
            .professor_login(LoginInput {
                email: "admin@tutorly.app".into(),
                password: "motdepasse".into(),
            })
            .await
            .unwrap();
        assert_eq!(admin.role, AuthRole::Admin);

        let prof = auth
            .professor_login(LoginInput {
                email: "prof@tutorly.app".into(),
                password: "motdepasse".into(),
            })
            .await
            .unwrap();
        assert_eq!(prof.role, AuthRole::Professor);
    }
}
