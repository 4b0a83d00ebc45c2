//! SQLite implementation of the SyncLog port
//!
//! The `sync_log` table holds one steady-state row per `(resource_type,
//! filter)` pair (enforced by a partial unique index over `query_id IS
//! NULL`) plus any number of in-flight paged-query rows keyed by
//! `query_id`. The filter column is `NOT NULL DEFAULT ''` because SQLite
//! treats NULLs as distinct inside unique indexes.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use medrelay_core::domain::{SyncError, SyncLogEntry};
use medrelay_core::ports::SyncLog;

use crate::queue::parse_datetime;

/// SQLite-backed synchronization checkpoint store
#[derive(Clone)]
pub struct SqliteSyncLog {
    pool: SqlitePool,
}

impl SqliteSyncLog {
    /// Creates a log store over the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SyncLog for SqliteSyncLog {
    async fn last_sync_time(
        &self,
        resource_type: &str,
        filter: &str,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let value: Option<Option<String>> = sqlx::query_scalar(
            "SELECT last_sync FROM sync_log \
             WHERE resource_type = ? AND filter = ? AND query_id IS NULL",
        )
        .bind(resource_type)
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::store("sync log", "last_sync_time", Some(resource_type.into()), e))?;

        match value.flatten() {
            Some(s) => Ok(Some(parse_datetime(&s)?)),
            None => Ok(None),
        }
    }

    async fn last_etag(
        &self,
        resource_type: &str,
        filter: &str,
    ) -> Result<Option<String>, SyncError> {
        let value: Option<Option<String>> = sqlx::query_scalar(
            "SELECT last_etag FROM sync_log \
             WHERE resource_type = ? AND filter = ? AND query_id IS NULL",
        )
        .bind(resource_type)
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::store("sync log", "last_etag", Some(resource_type.into()), e))?;

        Ok(value.flatten())
    }

    async fn save(
        &self,
        resource_type: &str,
        filter: &str,
        etag: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        // An empty etag never overwrites a previously known good one
        let etag = etag.filter(|e| !e.is_empty());

        sqlx::query(
            "INSERT INTO sync_log (resource_type, filter, last_sync, last_etag, last_error) \
             VALUES (?, ?, ?, ?, NULL) \
             ON CONFLICT (resource_type, filter) WHERE query_id IS NULL DO UPDATE SET \
                 last_sync = excluded.last_sync, \
                 last_etag = COALESCE(excluded.last_etag, sync_log.last_etag), \
                 last_error = NULL",
        )
        .bind(resource_type)
        .bind(filter)
        .bind(since.to_rfc3339())
        .bind(etag)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::store("sync log", "save", Some(resource_type.into()), e))?;

        tracing::trace!(resource_type, filter, "Checkpoint saved");
        Ok(())
    }

    async fn save_query(
        &self,
        resource_type: &str,
        filter: &str,
        query_id: Uuid,
        offset: i64,
    ) -> Result<(), SyncError> {
        if query_id.is_nil() {
            return Err(SyncError::invalid_argument(
                "query_id",
                "must not be the nil UUID",
            ));
        }

        // query_started_at is set on first insert only, so the original
        // start time survives offset updates
        sqlx::query(
            "INSERT INTO sync_log \
             (resource_type, filter, query_id, query_offset, query_started_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (resource_type, filter, query_id) WHERE query_id IS NOT NULL \
             DO UPDATE SET query_offset = excluded.query_offset",
        )
        .bind(resource_type)
        .bind(filter)
        .bind(query_id.to_string())
        .bind(offset)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::store("sync log", "save_query", Some(query_id.to_string()), e))?;

        tracing::trace!(resource_type, filter, query_id = %query_id, offset,
            "Query cursor saved");
        Ok(())
    }

    async fn complete_query(
        &self,
        resource_type: &str,
        filter: &str,
        query_id: Uuid,
    ) -> Result<(), SyncError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::store("sync log", "complete_query", None, e))?;

        let steady_exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sync_log \
             WHERE resource_type = ? AND filter = ? AND query_id IS NULL",
        )
        .bind(resource_type)
        .bind(filter)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| SyncError::store("sync log", "complete_query", None, e))?;

        // When a steady-state row already holds the pair's history, the
        // finished query row is redundant; otherwise clearing its cursor
        // fields turns it into the steady-state row, keeping whatever
        // last_sync/last_etag it carried. Either way the pair keeps exactly
        // one steady-state row. No-op when the query row does not exist.
        let result = if steady_exists > 0 {
            sqlx::query(
                "DELETE FROM sync_log \
                 WHERE resource_type = ? AND filter = ? AND query_id = ?",
            )
        } else {
            sqlx::query(
                "UPDATE sync_log \
                 SET query_id = NULL, query_offset = NULL, query_started_at = NULL \
                 WHERE resource_type = ? AND filter = ? AND query_id = ?",
            )
        }
        .bind(resource_type)
        .bind(filter)
        .bind(query_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| SyncError::store("sync log", "complete_query", Some(query_id.to_string()), e))?;

        tx.commit()
            .await
            .map_err(|e| SyncError::store("sync log", "complete_query", None, e))?;

        if result.rows_affected() > 0 {
            tracing::debug!(resource_type, filter, query_id = %query_id, "Query completed");
        }
        Ok(())
    }

    async fn find_query_data(
        &self,
        resource_type: &str,
        filter: &str,
    ) -> Result<Option<SyncLogEntry>, SyncError> {
        let row = sqlx::query(
            "SELECT * FROM sync_log \
             WHERE resource_type = ? AND filter = ? AND query_id IS NOT NULL \
             ORDER BY query_started_at ASC LIMIT 1",
        )
        .bind(resource_type)
        .bind(filter)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::store("sync log", "find_query_data", Some(resource_type.into()), e))?;

        match row {
            Some(ref row) => Ok(Some(log_entry_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn save_error(
        &self,
        resource_type: &str,
        filter: &str,
        error: &str,
    ) -> Result<(), SyncError> {
        let result = sqlx::query(
            "UPDATE sync_log SET last_error = ? \
             WHERE resource_type = ? AND filter = ? AND query_id IS NULL",
        )
        .bind(error)
        .bind(resource_type)
        .bind(filter)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::store("sync log", "save_error", Some(resource_type.into()), e))?;

        if result.rows_affected() > 0 {
            tracing::debug!(resource_type, filter, error, "Checkpoint error recorded");
        }
        Ok(())
    }

    async fn delete(&self, entry: &SyncLogEntry) -> Result<(), SyncError> {
        let result = match entry.query_id() {
            Some(query_id) => {
                sqlx::query(
                    "DELETE FROM sync_log \
                     WHERE resource_type = ? AND filter = ? AND query_id = ?",
                )
                .bind(entry.resource_type())
                .bind(entry.filter())
                .bind(query_id.to_string())
                .execute(&self.pool)
                .await
            }
            None => {
                sqlx::query("DELETE FROM sync_log WHERE resource_type = ? AND filter = ?")
                    .bind(entry.resource_type())
                    .bind(entry.filter())
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| {
            SyncError::store("sync log", "delete", Some(entry.resource_type().into()), e)
        })?;

        tracing::debug!(resource_type = entry.resource_type(), filter = entry.filter(),
            rows = result.rows_affected(), "Checkpoint rows deleted");
        Ok(())
    }

    async fn all(&self) -> Result<Vec<SyncLogEntry>, SyncError> {
        let rows = sqlx::query(
            "SELECT * FROM sync_log WHERE query_id IS NULL ORDER BY resource_type, filter",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::store("sync log", "all", None, e))?;

        rows.iter().map(log_entry_from_row).collect()
    }

    async fn prune_stale_queries(&self, older_than: DateTime<Utc>) -> Result<u64, SyncError> {
        let result = sqlx::query(
            "DELETE FROM sync_log WHERE query_id IS NOT NULL AND query_started_at < ?",
        )
        .bind(older_than.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::store("sync log", "prune_stale_queries", None, e))?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            tracing::info!(pruned, "Stale query checkpoints pruned");
        }
        Ok(pruned)
    }
}

/// Reconstruct a SyncLogEntry from a database row
fn log_entry_from_row(row: &SqliteRow) -> Result<SyncLogEntry, SyncError> {
    let resource_type: String = row.get("resource_type");
    let filter: String = row.get("filter");
    let last_sync_str: Option<String> = row.get("last_sync");
    let last_etag: Option<String> = row.get("last_etag");
    let last_error: Option<String> = row.get("last_error");
    let query_id_str: Option<String> = row.get("query_id");
    let query_offset: Option<i64> = row.get("query_offset");
    let query_started_at_str: Option<String> = row.get("query_started_at");

    let last_sync = match last_sync_str {
        Some(ref s) => Some(parse_datetime(s)?),
        None => None,
    };

    let mut entry = SyncLogEntry::new(resource_type, filter)
        .with_last_sync(last_sync)
        .with_last_etag(last_etag)
        .with_last_error(last_error);

    if let Some(ref query_id_str) = query_id_str {
        let query_id = Uuid::parse_str(query_id_str).map_err(|e| {
            SyncError::store(
                "sync log",
                "read",
                Some(query_id_str.clone()),
                anyhow::anyhow!("invalid query id: {}", e),
            )
        })?;
        let started_at = match query_started_at_str {
            Some(ref s) => parse_datetime(s)?,
            None => Utc::now(),
        };
        entry = entry.with_query(query_id, query_offset.unwrap_or(0), started_at);
    }

    Ok(entry)
}
