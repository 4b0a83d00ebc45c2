//! SQLite connection handling for the synchronization store
//!
//! One [`DatabasePool`] backs every queue and the checkpoint log of a
//! store. Opening it prepares the file (parent directories, WAL, foreign
//! keys) and applies the embedded schema, so a freshly provisioned machine
//! needs no separate migration step. Foreign keys must be on: the
//! dead-letter overlay rows cascade with their queue entries.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::StoreError;

/// Pooled SQLite handle shared by the queues and the checkpoint log
///
/// File-backed pools run WAL with up to 5 connections and a 5-second busy
/// timeout, so concurrent readers never block behind a writer. The
/// in-memory variant is capped at a single connection because SQLite gives
/// every connection its own private `:memory:` database.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the store database at `db_path`
    ///
    /// Parent directories are created, the schema is applied, and the
    /// connection options described on the type are in effect.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` if the file cannot be opened,
    /// or `StoreError::MigrationFailed` if applying the schema fails.
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!(
                    "Failed to connect to database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::info!(
            path = %db_path.display(),
            "Database pool initialized"
        );

        Ok(Self { pool })
    }

    /// Opens a private in-memory database, schema applied
    ///
    /// Intended for tests; the single connection keeps the data alive for
    /// the pool's lifetime.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::ConnectionFailed` if the connection cannot be
    /// established, or `StoreError::MigrationFailed` if applying the schema
    /// fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                StoreError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        // connect() takes no options, so the pragma goes in by hand
        sqlx::raw_sql("PRAGMA foreign_keys = ON;")
            .execute(&pool)
            .await
            .map_err(|e| {
                StoreError::MigrationFailed(format!("Failed to enable foreign keys: {}", e))
            })?;

        Self::run_migrations(&pool).await?;

        tracing::debug!("In-memory database pool initialized");

        Ok(Self { pool })
    }

    /// The underlying SQLx pool, for constructing queues and log stores
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded schema; every statement is IF NOT EXISTS
    async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
        let migration_sql = include_str!("migrations/20260810_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| {
                StoreError::MigrationFailed(format!("Failed to run initial migration: {}", e))
            })?;

        tracing::debug!("Database migrations completed");
        Ok(())
    }
}
