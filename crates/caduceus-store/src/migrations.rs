//! Database migration management.
//!
//! Embeds SQL migrations and provides functions to apply them. Uses
//! `SQLx`'s built-in migration support with compile-time embedding.

use crate::error::{DatabaseError, Result};
use sqlx::{Pool, Sqlite};

/// Run all pending database migrations.
///
/// Applied migrations are tracked in a `_sqlx_migrations` table, so
/// running this repeatedly is safe.
///
/// # Errors
/// Returns `DatabaseError::Migration` if any migration fails to execute.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    tracing::info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration execution failed: {e}")))?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
