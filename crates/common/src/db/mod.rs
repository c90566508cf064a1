//! Database layer for Tutorly
//!
//! Provides:
//! - SeaORM entity models
//! - Repositories for data access
//! - Unit of work (transaction scope)
//! - Connection pool management and migrations

pub mod models;
pub mod repositories;
pub mod schema;
mod unit_of_work;

pub use unit_of_work::{UnitOfWork, WorkFuture};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(connect_options(&config.url, config))
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e),
            })?;

        // Connect to replica if configured
        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");

            let replica_conn = Database::connect(connect_options(read_url, config))
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Failed to connect to replica: {}", e),
                })?;

            Some(replica_conn)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    /// Wrap an existing connection (tests, tools)
    pub fn from_connection(primary: DatabaseConnection) -> Self {
        Self {
            primary,
            replica: None,
        }
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Transaction scope on the primary
    pub fn unit_of_work(&self) -> UnitOfWork {
        UnitOfWork::new(self.primary.clone())
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }

    /// Apply pending SQL migrations
    ///
    /// Migrations are written for PostgreSQL; other backends build their
    /// schema from the entities instead.
    pub async fn migrate(&self) -> Result<()> {
        match self.primary.get_database_backend() {
            DbBackend::Postgres => {
                let pool = self.primary.get_postgres_connection_pool();
                let migrator = sqlx::migrate!("./migrations");
                info!(count = migrator.iter().count(), "Applying database migrations");
                migrator.run(pool).await?;
                info!("Database migrations applied");
            }
            backend => {
                info!(?backend, "Non-postgres backend, creating schema from entities");
                schema::create_all(&self.primary).await?;
            }
        }
        Ok(())
    }
}

fn connect_options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
    let mut opts = ConnectOptions::new(url);
    opts.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .sqlx_logging(false);
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_ping_in_memory() {
        let pool = setup_test_db().await.unwrap();
        assert!(pool.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_read_falls_back_to_primary() {
        let pool = setup_test_db().await.unwrap();
        assert!(pool.replica.is_none());
        assert_eq!(
            pool.read().get_database_backend(),
            pool.write().get_database_backend()
        );
    }
}
