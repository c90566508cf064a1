//! Configuration management for Tutorly services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Deployment environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Stripe configuration
    #[serde(default)]
    pub stripe: StripeConfig,

    /// SMS gateway configuration
    #[serde(default)]
    pub sms: SmsConfig,

    /// Transactional email configuration
    #[serde(default)]
    pub email: EmailConfig,

    /// Verification code policy
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins (empty allows any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations at startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// JWT secret for token signing
    pub jwt_secret: Option<String>,

    /// JWT expiration in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Professor accounts signed in with the `admin` role
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeConfig {
    /// Secret API key (sk_...)
    pub secret_key: Option<String>,

    /// Webhook endpoint signing secret (whsec_...)
    pub webhook_secret: Option<String>,

    /// API base URL
    #[serde(default = "default_stripe_api_base")]
    pub api_base: String,

    /// Request timeout in seconds
    #[serde(default = "default_external_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on transport errors
    #[serde(default = "default_external_retries")]
    pub max_retries: u32,

    /// Accepted clock skew for webhook timestamps
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmsConfig {
    /// Provider: http, log
    #[serde(default = "default_log_provider")]
    pub provider: String,

    /// Provider endpoint for the http provider
    pub api_url: Option<String>,

    /// Provider API key
    pub api_key: Option<String>,

    /// Sender name shown on the handset
    #[serde(default = "default_sms_sender")]
    pub sender: String,

    /// Request timeout in seconds
    #[serde(default = "default_external_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    /// Provider: http, log
    #[serde(default = "default_log_provider")]
    pub provider: String,

    /// Provider endpoint for the http provider
    pub api_url: Option<String>,

    /// Provider API key
    pub api_key: Option<String>,

    /// From address
    #[serde(default = "default_email_from")]
    pub from: String,

    /// Request timeout in seconds
    #[serde(default = "default_external_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
    /// Number of digits in a code
    #[serde(default = "default_code_length")]
    pub code_length: usize,

    /// Code lifetime in seconds
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: i64,

    /// Wrong guesses allowed before the code is burned
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second on sensitive procedures (auth, verification)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_environment() -> String { "development".to_string() }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_run_migrations() -> bool { true }
fn default_jwt_expiration() -> u64 { 60 * 60 * 24 * 7 }
fn default_stripe_api_base() -> String { "https://api.stripe.com".to_string() }
fn default_external_timeout() -> u64 { 10 }
fn default_external_retries() -> u32 { 2 }
fn default_webhook_tolerance() -> i64 { 300 }
fn default_log_provider() -> String { "log".to_string() }
fn default_sms_sender() -> String { "Tutorly".to_string() }
fn default_email_from() -> String { "no-reply@tutorly.app".to_string() }
fn default_code_length() -> usize { 6 }
fn default_code_ttl() -> i64 { 15 * 60 }
fn default_max_attempts() -> i32 { 5 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "tutorly".to_string() }
fn default_rate_limit() -> u32 { 5 }
fn default_burst() -> u32 { 20 }
fn default_enabled() -> bool { true }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiration_secs: default_jwt_expiration(),
            admin_emails: Vec::new(),
        }
    }
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            api_base: default_stripe_api_base(),
            timeout_secs: default_external_timeout(),
            max_retries: default_external_retries(),
            webhook_tolerance_secs: default_webhook_tolerance(),
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            provider: default_log_provider(),
            api_url: None,
            api_key: None,
            sender: default_sms_sender(),
            timeout_secs: default_external_timeout(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            provider: default_log_provider(),
            api_url: None,
            api_key: None,
            from: default_email_from(),
            timeout_secs: default_external_timeout(),
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            code_ttl_secs: default_code_ttl(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("environment", env.as_str())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot run outside development
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() {
            if self.auth.jwt_secret.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::Message(
                    "auth.jwt_secret is required in production".to_string(),
                ));
            }
            if self.stripe.secret_key.is_none() || self.stripe.webhook_secret.is_none() {
                return Err(ConfigError::Message(
                    "stripe.secret_key and stripe.webhook_secret are required in production".to_string(),
                ));
            }
        }

        if !(4..=10).contains(&self.verification.code_length) {
            return Err(ConfigError::Message(
                "verification.code_length must be between 4 and 10".to_string(),
            ));
        }

        if self.verification.max_attempts < 1 {
            return Err(ConfigError::Message(
                "verification.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }

    /// JWT secret, with a fixed development fallback
    pub fn jwt_secret(&self) -> &str {
        self.auth
            .jwt_secret
            .as_deref()
            .unwrap_or("tutorly-development-secret")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
                cors_origins: Vec::new(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/tutorly".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                run_migrations: default_run_migrations(),
            },
            auth: AuthConfig::default(),
            stripe: StripeConfig::default(),
            sms: SmsConfig::default(),
            email: EmailConfig::default(),
            verification: VerificationConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.verification.code_length, 6);
        assert_eq!(config.stripe.api_base, "https://api.stripe.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/tutorly");
    }

    #[test]
    fn test_production_requires_secrets() {
        let mut config = AppConfig::default();
        config.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.auth.jwt_secret = Some("s3cret".to_string());
        config.stripe.secret_key = Some("sk_live_x".to_string());
        config.stripe.webhook_secret = Some("whsec_x".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_code_length_bounds() {
        let mut config = AppConfig::default();
        config.verification.code_length = 3;
        assert!(config.validate().is_err());
    }
}
