//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations.
//! Every by-id lookup is scoped by the owning user, so a foreign id
//! reads exactly like a missing one.

mod conversations;
mod documents;
mod memories;
mod search;
mod tags;
mod users;

pub use conversations::NewMessage;
pub use documents::{DocumentFilter, DocumentStatusUpdate, NewDocument};
pub use memories::NewMemory;
pub use search::{SearchHit, SearchMode};
pub use tags::{slugify, TagGraph, TagPatch};
pub use users::UserPatch;

use crate::db::DbPool;
use crate::errors::Result;
use sea_orm::DatabaseConnection;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// The underlying pool, for shutdown
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Repository;
    use crate::db::DbPool;
    use sea_orm::{DatabaseBackend, MockDatabase, Statement};
    use std::sync::Arc;

    /// Repository over a mock Postgres connection
    pub fn mock_repo(db: MockDatabase) -> Repository {
        Repository::new(DbPool::from_connection(db.into_connection()))
    }

    /// Repository whose every query fails, proving no statement was issued
    pub fn empty_repo() -> Repository {
        mock_repo(MockDatabase::new(DatabaseBackend::Postgres))
    }

    /// Every statement the repository sent, in order
    pub fn statements(repo: Repository) -> Vec<Statement> {
        let Repository { pool } = repo;
        let Ok(primary) = Arc::try_unwrap(pool.primary) else {
            panic!("connection is still shared");
        };
        primary
            .into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements().to_vec())
            .collect()
    }

    /// SQL text of every statement, in order
    pub fn sql_log(repo: Repository) -> Vec<String> {
        statements(repo).into_iter().map(|stmt| stmt.sql).collect()
    }
}
