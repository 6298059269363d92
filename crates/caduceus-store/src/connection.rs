//! Database connection management.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// `SQLite` connection pool for the audit and cost stores.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `":memory:"` for an in-memory database; in-memory databases
    /// are pinned to a single connection since each `SQLite` connection
    /// would otherwise see its own empty store.
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the path is invalid or the pool
    /// cannot be created.
    pub async fn connect(path: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(path)
            .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
            .create_if_missing(true);

        let max_connections = if path == ":memory:" { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .map_err(|e| DatabaseError::Open(format!("failed to create pool: {e}")))?;

        tracing::info!("Database pool created at {}", path);

        Ok(Self { pool })
    }

    /// Run all pending migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        crate::migrations::run_migrations(&self.pool).await
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = Database::connect(":memory:").await.expect("connect");
        sqlx::query("SELECT 1")
            .execute(db.pool())
            .await
            .expect("query");
    }
}
