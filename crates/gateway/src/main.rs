//! Tutorly API Gateway
//!
//! The single entry point for the student, parent, professor and
//! backoffice applications.
//! Handles:
//! - Typed RPC procedures (`POST /rpc/<namespace>.<procedure>`)
//! - Authentication and rate limiting
//! - Stripe webhooks
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;
mod state;


use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tutorly_common::{
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    integrations::{email_sender_from_config, sms_gateway_from_config, StripeClient},
    metrics,
};

use crate::middleware::rate_limit::{self, RateLimit};
pub use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&config.observability)?;
    info!(
        version = tutorly_common::VERSION,
        environment = %config.environment,
        "Starting Tutorly API Gateway"
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        metrics::register_metrics();
        info!(%metrics_addr, "Prometheus exporter listening");
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate().await?;
    }

    // Outbound integrations
    let payments = Arc::new(StripeClient::new(&config.stripe)?);
    let sms = sms_gateway_from_config(&config.sms)?;
    let email = email_sender_from_config(&config.email)?;
    if config.stripe.secret_key.is_none() {
        warn!("stripe.secret_key is not set, billing procedures will fail");
    }

    let config = Arc::new(config);
    let state = AppState::new(config.clone(), db, payments, sms, email);

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let allow_origin = if config.server.cors_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .server
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse().ok()),
        )
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Sign-in and code delivery share one throttled router
    let throttled = Router::new()
        .route("/rpc/auth.register", post(handlers::auth::register))
        .route("/rpc/auth.login", post(handlers::auth::login))
        .route("/rpc/auth.professorLogin", post(handlers::auth::professor_login))
        .route("/rpc/verification.sendEmailCode", post(handlers::verification::send_email_code))
        .route("/rpc/verification.sendSmsCode", post(handlers::verification::send_sms_code))
        .route("/rpc/verification.verifyEmail", post(handlers::verification::verify_email))
        .route("/rpc/verification.verifySms", post(handlers::verification::verify_sms));
    let throttled = if config.rate_limit.enabled {
        let limit = RateLimit::new(config.rate_limit.requests_per_second, config.rate_limit.burst);
        throttled.route_layer(axum::middleware::from_fn_with_state(limit, rate_limit::rate_limit))
    } else {
        throttled
    };

    let procedures = Router::new()
        // Account
        .route("/rpc/user.me", post(handlers::user::me))
        .route("/rpc/user.updateProfile", post(handlers::user::update_profile))
        .route("/rpc/user.completeOnboarding", post(handlers::user::complete_onboarding))
        .route("/rpc/user.unlocks", post(handlers::user::unlocks))
        .route("/rpc/user.deleteAccount", post(handlers::user::delete_account))

        // Parents
        .route("/rpc/family.linkChild", post(handlers::family::link_child))
        .route("/rpc/family.listChildren", post(handlers::family::list_children))
        .route("/rpc/family.unlinkChild", post(handlers::family::unlink_child))
        .route("/rpc/family.transferTokens", post(handlers::family::transfer_tokens))

        // Catalog browsing
        .route("/rpc/catalog.listModules", post(handlers::catalog::list_modules))
        .route("/rpc/catalog.getModule", post(handlers::catalog::get_module))
        .route("/rpc/catalog.listChapters", post(handlers::catalog::list_chapters))
        .route("/rpc/catalog.listSheets", post(handlers::catalog::list_sheets))
        .route("/rpc/catalog.readSheet", post(handlers::catalog::read_sheet))
        .route("/rpc/catalog.unlockSheet", post(handlers::catalog::unlock_sheet))

        // Professor content management
        .route("/rpc/professor.me", post(handlers::professor::me))
        .route("/rpc/professor.myModules", post(handlers::professor::my_modules))
        .route("/rpc/professor.createModule", post(handlers::professor::create_module))
        .route("/rpc/professor.updateModule", post(handlers::professor::update_module))
        .route("/rpc/professor.deleteModule", post(handlers::professor::delete_module))
        .route("/rpc/professor.createChapter", post(handlers::professor::create_chapter))
        .route("/rpc/professor.deleteChapter", post(handlers::professor::delete_chapter))
        .route("/rpc/professor.createSheet", post(handlers::professor::create_sheet))
        .route("/rpc/professor.getSheet", post(handlers::professor::get_sheet))
        .route("/rpc/professor.updateSheet", post(handlers::professor::update_sheet))
        .route("/rpc/professor.deleteSheet", post(handlers::professor::delete_sheet))

        // Billing
        .route("/rpc/billing.listPlans", post(handlers::billing::list_plans))
        .route("/rpc/billing.checkPromoCode", post(handlers::billing::check_promo_code))
        .route("/rpc/billing.checkout", post(handlers::billing::checkout))
        .route("/rpc/billing.cancel", post(handlers::billing::cancel))
        .route("/rpc/billing.subscription", post(handlers::billing::subscription))
        .route("/rpc/billing.payments", post(handlers::billing::payments))
        .route("/rpc/billing.invoices", post(handlers::billing::invoices))

        // Tokens
        .route("/rpc/tokens.balance", post(handlers::tokens::balance))

        // Content
        .route("/rpc/faq.list", post(handlers::faq::list))
        .route("/rpc/pastPapers.list", post(handlers::past_papers::list))
        .route("/rpc/pastPapers.get", post(handlers::past_papers::get))

        // Backoffice
        .route("/rpc/admin.createProfessor", post(handlers::admin::create_professor))
        .route("/rpc/admin.listProfessors", post(handlers::admin::list_professors))
        .route("/rpc/admin.createPromoCode", post(handlers::admin::create_promo_code))
        .route("/rpc/admin.listPromoCodes", post(handlers::admin::list_promo_codes))
        .route("/rpc/admin.deactivatePromoCode", post(handlers::admin::deactivate_promo_code))
        .route("/rpc/admin.grantTokens", post(handlers::admin::grant_tokens))
        .route("/rpc/admin.createFaq", post(handlers::admin::create_faq))
        .route("/rpc/admin.deleteFaq", post(handlers::admin::delete_faq))
        .route("/rpc/admin.createPastPaper", post(handlers::admin::create_past_paper))

        .merge(throttled)
        .fallback(handlers::unknown_procedure)
        .layer(axum::middleware::from_fn(middleware::metrics::track_procedure));

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Stripe calls back with a signed payload
        .route("/webhooks/stripe", post(handlers::webhooks::stripe))

        .merge(procedures)
        .layer(
            ServiceBuilder::new()
                .layer(request_id)
                .layer(propagate_id)
                .layer(TraceLayer::new_for_http())
                .layer(request_timeout_layer(config.request_timeout()))
                .layer(cors),
        )
        .with_state(state)
}

/// Requests running longer than `timeout` are answered with 408
pub fn request_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
