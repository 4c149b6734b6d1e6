//! Database layer for Cortex
//!
//! Provides:
//! - SeaORM entity models
//! - Repository pattern for data access
//! - Connection pool management and drain on shutdown
//! - Bundled SQL migrations

pub mod models;
mod repository;

pub use repository::{
    slugify, DocumentFilter, DocumentStatusUpdate, NewDocument, NewMemory, NewMessage,
    Repository, SearchHit, SearchMode, TagGraph, TagPatch, UserPatch,
};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Database connection pool wrapper
///
/// Connections are shared behind `Arc`; `DatabaseConnection` itself is not
/// `Clone` when the mock backend is compiled in.
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: Arc<DatabaseConnection>,

    /// Read replica connection (optional)
    pub replica: Option<Arc<DatabaseConnection>>,
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

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(connect_options(&config.url, config))
            .await
            .map_err(|e| AppError::ServiceUnavailable {
                message: format!("Failed to connect to primary: {}", e),
            })?;

        let replica = match config.read_url {
            Some(ref read_url) => {
                info!("Connecting to read replica...");
                let conn = Database::connect(connect_options(read_url, config))
                    .await
                    .map_err(|e| AppError::ServiceUnavailable {
                        message: format!("Failed to connect to replica: {}", e),
                    })?;
                Some(Arc::new(conn))
            }
            None => None,
        };

        info!("Database connections established");

        Ok(Self {
            primary: Arc::new(primary),
            replica,
        })
    }

    /// Wrap an existing connection (used with `MockDatabase` in tests)
    pub fn from_connection(primary: DatabaseConnection) -> Self {
        Self {
            primary: Arc::new(primary),
            replica: None,
        }
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_deref().unwrap_or(self.primary.as_ref())
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        self.primary.as_ref()
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::ServiceUnavailable {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::ServiceUnavailable {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }

    /// Apply pending migrations on the primary
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");
        MIGRATOR
            .run(self.primary.get_postgres_connection_pool())
            .await
            .map_err(|e| AppError::ServiceUnavailable {
                message: format!("Migration failed: {}", e),
            })?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Drain and close all connections, including those shared with
    /// clones still held elsewhere
    pub async fn close(self) -> Result<()> {
        if let Some(replica) = self.replica {
            replica.close_by_ref().await?;
        }
        self.primary.close_by_ref().await?;
        info!("Database connections closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn mock_pool(db: MockDatabase) -> DbPool {
        DbPool::from_connection(db.into_connection())
    }

    #[tokio::test]
    async fn test_clones_share_one_connection() {
        let pool = mock_pool(MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
        ]));
        let clone = pool.clone();

        assert!(Arc::ptr_eq(&pool.primary, &clone.primary));
        assert!(std::ptr::eq(clone.read(), pool.write()));

        // The single queued result is consumed through the clone
        clone.ping().await.unwrap();
        assert!(pool.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_close_with_outstanding_clone() {
        let pool = mock_pool(MockDatabase::new(DatabaseBackend::Postgres));
        let _held = pool.clone();

        pool.close().await.unwrap();
    }
}
