//! Application state shared across handlers

use axum::extract::FromRef;
use std::sync::Arc;
use tutorly_common::{
    auth::JwtManager,
    config::AppConfig,
    db::DbPool,
    integrations::{EmailSender, PaymentGateway, SmsGateway},
    services::{AuthService, BillingService, CatalogService, FamilyService, VerificationService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtManager>,
    pub auth: AuthService,
    pub verification: VerificationService,
    pub family: FamilyService,
    pub catalog: CatalogService,
    pub billing: BillingService,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: DbPool,
        payments: Arc<dyn PaymentGateway>,
        sms: Arc<dyn SmsGateway>,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        let jwt = Arc::new(JwtManager::new(
            config.jwt_secret(),
            config.auth.jwt_expiration_secs,
        ));

        Self {
            auth: AuthService::new(db.clone(), jwt.clone(), config.auth.admin_emails.clone()),
            verification: VerificationService::new(
                db.clone(),
                sms,
                email,
                config.verification.clone(),
            ),
            family: FamilyService::new(db.clone()),
            catalog: CatalogService::new(db.clone()),
            billing: BillingService::new(db.clone(), payments, &config.stripe),
            jwt,
            db,
            config,
        }
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}
