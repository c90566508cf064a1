//! Tutorly Common Library
//!
//! Shared code for the Tutorly backend:
//! - Database entities, repositories and the unit of work
//! - Application services (accounts, verification, catalog, billing)
//! - Outbound integrations (Stripe, SMS, email)
//! - Error types, configuration, authentication and metrics

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod integrations;
pub mod metrics;
pub mod schemas;
pub mod services;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::DbPool;
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
