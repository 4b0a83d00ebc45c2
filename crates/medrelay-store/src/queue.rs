//! SQLite implementation of the SyncQueue port
//!
//! One `SqliteSyncQueue` instance wraps one row of `sync_queues` and owns
//! all entry operations against it. FIFO order is the AUTOINCREMENT id:
//! `peek` and `dequeue` always observe the lowest surviving id.
//!
//! Payload bytes live in the blob store, referenced by `blob_key`. Copies
//! between queues share the blob, so removal is guarded by a live query for
//! other referents instead of a maintained counter. The blob store is not
//! transactional with SQLite; when a multi-step operation fails part-way,
//! blob cleanup is attempted best-effort and the original error is the one
//! reported.
//!
//! Enqueue, dequeue and delete serialize through a per-queue mutex in
//! addition to their SQLite transaction. That protects intra-process races;
//! contention from other processes is left to SQLite's own locking.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use medrelay_core::domain::{
    BlobKey, CorrelationKey, DeadLetterInfo, EntryId, QueueEntry, QueueKey, QueuePattern,
    SyncError, SyncOperation, SyncPayload,
};
use medrelay_core::ports::{
    BlobStore, EnqueueHook, EntryFilter, HookDecision, PayloadCodecRegistry, SyncQueue,
};

/// SQLite-backed synchronization queue
pub struct SqliteSyncQueue {
    pool: SqlitePool,
    key: QueueKey,
    name: String,
    pattern: QueuePattern,
    blobs: Arc<dyn BlobStore>,
    codecs: Arc<PayloadCodecRegistry>,
    hooks: Vec<Arc<dyn EnqueueHook>>,
    /// Serializes this queue's mutating operations within the process
    gate: tokio::sync::Mutex<()>,
}

impl SqliteSyncQueue {
    /// Creates a queue instance over an existing `sync_queues` row
    ///
    /// Normally constructed by [`SyncQueueRegistry::load`], which reads the
    /// persisted queue set once at startup.
    ///
    /// [`SyncQueueRegistry::load`]: crate::registry::SyncQueueRegistry::load
    pub fn new(
        pool: SqlitePool,
        key: QueueKey,
        name: impl Into<String>,
        pattern: QueuePattern,
        blobs: Arc<dyn BlobStore>,
        codecs: Arc<PayloadCodecRegistry>,
        hooks: Vec<Arc<dyn EnqueueHook>>,
    ) -> Self {
        Self {
            pool,
            key,
            name: name.into(),
            pattern,
            blobs,
            codecs,
            hooks,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Runs the pre-commit hooks; the first rejection wins
    async fn run_before_hooks(
        &self,
        payload: &SyncPayload,
        operation: SyncOperation,
    ) -> Result<(), SyncError> {
        for hook in &self.hooks {
            if let HookDecision::Reject(reason) =
                hook.before_enqueue(&self.name, payload, operation).await
            {
                tracing::debug!(queue = %self.name, %reason, "Enqueue vetoed by hook");
                return Err(SyncError::EnqueueRejected { reason });
            }
        }
        Ok(())
    }

    async fn run_after_hooks(&self, entry: &QueueEntry) {
        for hook in &self.hooks {
            hook.after_enqueue(&self.name, entry).await;
        }
    }

    /// Loads and decodes the payload an entry references
    async fn load_payload(&self, entry: &QueueEntry) -> Result<SyncPayload, SyncError> {
        let data = self.blobs.get(entry.blob_key()).await?;
        let codec = self.codecs.resolve(entry.resource_type())?;
        codec.decode(entry.resource_type(), &data)
    }

    /// Removes a blob unless another surviving entry still references it
    ///
    /// Cleanup is best-effort: the rows are already committed, so a failure
    /// here leaks a blob rather than corrupting the queue. It is logged and
    /// swallowed.
    async fn remove_blob_if_unreferenced(&self, blob_key: &BlobKey) {
        let referents: Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_entries WHERE blob_key = ?")
                .bind(blob_key.as_str())
                .fetch_one(&self.pool)
                .await;

        match referents {
            Ok(0) => {
                if let Err(e) = self.blobs.remove(blob_key).await {
                    tracing::warn!(queue = %self.name, blob = %blob_key, error = %e,
                        "Failed to remove orphaned payload blob");
                }
            }
            Ok(_) => {
                tracing::trace!(blob = %blob_key, "Payload blob still referenced, kept");
            }
            Err(e) => {
                tracing::warn!(queue = %self.name, blob = %blob_key, error = %e,
                    "Failed to check payload blob references");
            }
        }
    }

    /// Reads the head row of this queue, overlay resolved, payload loaded
    async fn read_head(&self) -> Result<Option<QueueEntry>, SyncError> {
        let row = sqlx::query(
            "SELECT e.*, d.original_queue AS dl_original_queue, d.reason AS dl_reason \
             FROM queue_entries e \
             LEFT JOIN dead_letter_entries d ON d.id = e.id \
             WHERE e.queue_key = ? \
             ORDER BY e.id ASC LIMIT 1",
        )
        .bind(self.key.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::store("queue entry", "peek", None, e))?;

        let Some(ref row) = row else {
            return Ok(None);
        };

        let entry = entry_from_row(row)?;
        let payload = self.load_payload(&entry).await?;
        Ok(Some(entry.with_payload(payload)))
    }
}

#[async_trait::async_trait]
impl SyncQueue for SqliteSyncQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn key(&self) -> &QueueKey {
        &self.key
    }

    fn pattern(&self) -> QueuePattern {
        self.pattern
    }

    async fn enqueue(
        &self,
        payload: SyncPayload,
        operation: SyncOperation,
    ) -> Result<QueueEntry, SyncError> {
        if self.pattern.is_dead_letter() {
            return Err(SyncError::DeadLetterEnqueue {
                queue: self.name.clone(),
            });
        }

        self.run_before_hooks(&payload, operation).await?;

        let codec = self.codecs.resolve(payload.resource_type())?;
        let content_type = codec.content_type();
        let data = codec.encode(&payload)?;
        let blob_key = self.blobs.add(&data).await?;

        let correlation_key = payload
            .correlation_key()
            .copied()
            .unwrap_or_else(CorrelationKey::new);
        let entry = QueueEntry::new(
            self.key,
            correlation_key,
            operation,
            payload.resource_type(),
            content_type,
            blob_key.clone(),
        );

        let _guard = self.gate.lock().await;
        let insert = sqlx::query(
            "INSERT INTO queue_entries \
             (queue_key, correlation_key, operation, resource_type, content_type, \
              blob_key, creation_time, retry_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.key.to_string())
        .bind(entry.correlation_key().to_string())
        .bind(entry.operation().as_str())
        .bind(entry.resource_type())
        .bind(entry.content_type())
        .bind(blob_key.as_str())
        .bind(entry.creation_time().to_rfc3339())
        .bind(entry.retry_count().map(i64::from))
        .execute(&self.pool)
        .await;

        let result = match insert {
            Ok(result) => result,
            Err(e) => {
                drop(_guard);
                // The blob was written before the row; compensate so a
                // failed insert does not strand payload bytes.
                self.remove_blob_if_unreferenced(&blob_key).await;
                return Err(SyncError::store(
                    "queue entry",
                    "enqueue",
                    Some(correlation_key.to_string()),
                    e,
                ));
            }
        };
        drop(_guard);

        let id = EntryId::new(result.last_insert_rowid());
        let entry = entry.with_id(id);
        tracing::debug!(queue = %self.name, id = %id,
            resource_type = entry.resource_type(), "Entry enqueued");

        self.run_after_hooks(&entry).await;
        Ok(entry)
    }

    async fn enqueue_entry(
        &self,
        entry: &QueueEntry,
        reason: Option<&str>,
    ) -> Result<QueueEntry, SyncError> {
        let into_dead_letter = self.pattern.is_dead_letter();
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        if into_dead_letter {
            if entry.is_dead_lettered() {
                return Err(SyncError::AlreadyDeadLettered {
                    entry: entry.id().map_or(0, |id| id.value()),
                });
            }
            if reason.is_none() {
                return Err(SyncError::ReasonRequired {
                    queue: self.name.clone(),
                });
            }
        }

        // The copy shares the source's blob; decode it only for hook
        // inspection so hookless queues skip the round-trip.
        if !self.hooks.is_empty() {
            let payload = self.load_payload(entry).await?;
            self.run_before_hooks(&payload, entry.operation()).await?;
        }

        let copy = QueueEntry::new(
            self.key,
            *entry.correlation_key(),
            entry.operation(),
            entry.resource_type(),
            entry.content_type(),
            entry.blob_key().clone(),
        )
        .with_retry_count(entry.next_retry_count(into_dead_letter));

        let _guard = self.gate.lock().await;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::store("queue entry", "move", None, e))?;

        let result = sqlx::query(
            "INSERT INTO queue_entries \
             (queue_key, correlation_key, operation, resource_type, content_type, \
              blob_key, creation_time, retry_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.key.to_string())
        .bind(copy.correlation_key().to_string())
        .bind(copy.operation().as_str())
        .bind(copy.resource_type())
        .bind(copy.content_type())
        .bind(copy.blob_key().as_str())
        .bind(copy.creation_time().to_rfc3339())
        .bind(copy.retry_count().map(i64::from))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            SyncError::store(
                "queue entry",
                "move",
                Some(copy.correlation_key().to_string()),
                e,
            )
        })?;

        let id = result.last_insert_rowid();
        let mut copy = copy.with_id(EntryId::new(id));

        if into_dead_letter {
            let info = DeadLetterInfo::new(
                *entry.queue_key(),
                reason.unwrap_or_default(),
            );
            sqlx::query(
                "INSERT INTO dead_letter_entries (id, original_queue, reason) VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(info.original_queue().to_string())
            .bind(info.reason())
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::store("queue entry", "move", Some(id.to_string()), e))?;
            copy = copy.with_dead_letter(info);
        }

        tx.commit()
            .await
            .map_err(|e| SyncError::store("queue entry", "move", Some(id.to_string()), e))?;
        drop(_guard);

        tracing::debug!(queue = %self.name, id, from = %entry.queue_key(),
            dead_letter = into_dead_letter, "Entry copied into queue");

        self.run_after_hooks(&copy).await;
        Ok(copy)
    }

    async fn dequeue(&self) -> Result<Option<QueueEntry>, SyncError> {
        let _guard = self.gate.lock().await;

        let Some(entry) = self.read_head().await? else {
            return Ok(None);
        };
        // read_head returns persisted rows only, so the id is present
        let id = entry
            .id()
            .ok_or_else(|| SyncError::not_found("queue entry", "head"))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::store("queue entry", "dequeue", Some(id.to_string()), e))?;

        sqlx::query("DELETE FROM dead_letter_entries WHERE id = ?")
            .bind(id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::store("queue entry", "dequeue", Some(id.to_string()), e))?;

        sqlx::query("DELETE FROM queue_entries WHERE id = ?")
            .bind(id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::store("queue entry", "dequeue", Some(id.to_string()), e))?;

        tx.commit()
            .await
            .map_err(|e| SyncError::store("queue entry", "dequeue", Some(id.to_string()), e))?;
        drop(_guard);

        self.remove_blob_if_unreferenced(entry.blob_key()).await;

        tracing::debug!(queue = %self.name, id = %id, "Entry dequeued");
        Ok(Some(entry))
    }

    async fn peek(&self) -> Result<Option<QueueEntry>, SyncError> {
        self.read_head().await
    }

    async fn get(&self, id: EntryId) -> Result<QueueEntry, SyncError> {
        let row = sqlx::query(
            "SELECT e.*, d.original_queue AS dl_original_queue, d.reason AS dl_reason \
             FROM queue_entries e \
             LEFT JOIN dead_letter_entries d ON d.id = e.id \
             WHERE e.id = ? AND e.queue_key = ?",
        )
        .bind(id.value())
        .bind(self.key.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::store("queue entry", "get", Some(id.to_string()), e))?;

        match row {
            Some(ref row) => entry_from_row(row),
            None => Err(SyncError::not_found("queue entry", id)),
        }
    }

    async fn delete(&self, id: EntryId) -> Result<(), SyncError> {
        let _guard = self.gate.lock().await;

        let blob_key: Option<String> =
            sqlx::query_scalar("SELECT blob_key FROM queue_entries WHERE id = ? AND queue_key = ?")
                .bind(id.value())
                .bind(self.key.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SyncError::store("queue entry", "delete", Some(id.to_string()), e))?;

        let Some(blob_key) = blob_key else {
            return Err(SyncError::not_found("queue entry", id));
        };
        let blob_key = BlobKey::new(blob_key)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::store("queue entry", "delete", Some(id.to_string()), e))?;

        sqlx::query("DELETE FROM dead_letter_entries WHERE id = ?")
            .bind(id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::store("queue entry", "delete", Some(id.to_string()), e))?;

        sqlx::query("DELETE FROM queue_entries WHERE id = ?")
            .bind(id.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::store("queue entry", "delete", Some(id.to_string()), e))?;

        tx.commit()
            .await
            .map_err(|e| SyncError::store("queue entry", "delete", Some(id.to_string()), e))?;
        drop(_guard);

        self.remove_blob_if_unreferenced(&blob_key).await;

        tracing::debug!(queue = %self.name, id = %id, "Entry deleted");
        Ok(())
    }

    async fn query(&self, filter: &EntryFilter) -> Result<Vec<QueueEntry>, SyncError> {
        let mut sql = String::from(
            "SELECT e.*, d.original_queue AS dl_original_queue, d.reason AS dl_reason \
             FROM queue_entries e \
             LEFT JOIN dead_letter_entries d ON d.id = e.id \
             WHERE e.queue_key = ?",
        );
        let mut binds: Vec<String> = vec![self.key.to_string()];

        if let Some(ref correlation_key) = filter.correlation_key {
            sql.push_str(" AND e.correlation_key = ?");
            binds.push(correlation_key.to_string());
        }
        if let Some(ref resource_type) = filter.resource_type {
            sql.push_str(" AND e.resource_type = ?");
            binds.push(resource_type.clone());
        }
        if let Some(operation) = filter.operation {
            sql.push_str(" AND e.operation = ?");
            binds.push(operation.as_str().to_string());
        }
        if let Some(ref created_after) = filter.created_after {
            sql.push_str(" AND e.creation_time >= ?");
            binds.push(created_after.to_rfc3339());
        }
        if let Some(ref created_before) = filter.created_before {
            sql.push_str(" AND e.creation_time < ?");
            binds.push(created_before.to_rfc3339());
        }
        // No bind for this one; it is a join-presence test
        match filter.dead_lettered {
            Some(true) => sql.push_str(" AND d.id IS NOT NULL"),
            Some(false) => sql.push_str(" AND d.id IS NULL"),
            None => {}
        }

        sql.push_str(" ORDER BY e.id ASC");

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SyncError::store("queue entry", "query", None, e))?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn count(&self) -> Result<u64, SyncError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_entries WHERE queue_key = ?")
                .bind(self.key.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| SyncError::store("queue entry", "count", None, e))?;
        Ok(count as u64)
    }
}

// ============================================================================
// Row readers
// ============================================================================

/// Parse an RFC 3339 timestamp stored as TEXT
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SyncError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            SyncError::store(
                "record",
                "read",
                None,
                anyhow::anyhow!("invalid timestamp '{}': {}", s, e),
            )
        })
}

/// Reconstruct a QueueEntry from a joined entry/overlay row
fn entry_from_row(row: &SqliteRow) -> Result<QueueEntry, SyncError> {
    let id: i64 = row.get("id");
    let queue_key_str: String = row.get("queue_key");
    let correlation_key_str: String = row.get("correlation_key");
    let operation_str: String = row.get("operation");
    let resource_type: String = row.get("resource_type");
    let content_type: String = row.get("content_type");
    let blob_key_str: String = row.get("blob_key");
    let creation_time_str: String = row.get("creation_time");
    let retry_count: Option<i64> = row.get("retry_count");
    let dl_original_queue: Option<String> = row.get("dl_original_queue");
    let dl_reason: Option<String> = row.get("dl_reason");

    let queue_key = QueueKey::from_str(&queue_key_str)?;
    let correlation_key = CorrelationKey::from_str(&correlation_key_str)?;
    let operation = SyncOperation::from_str(&operation_str)?;
    let blob_key = BlobKey::new(blob_key_str)?;
    let creation_time = parse_datetime(&creation_time_str)?;

    let mut entry = QueueEntry::new(
        queue_key,
        correlation_key,
        operation,
        resource_type,
        content_type,
        blob_key,
    )
    .with_id(EntryId::new(id))
    .with_creation_time(creation_time)
    .with_retry_count(retry_count.map(|n| n as u32));

    if let (Some(original_queue), Some(reason)) = (dl_original_queue, dl_reason) {
        let original_queue = QueueKey::from_str(&original_queue)?;
        entry = entry.with_dead_letter(DeadLetterInfo::new(original_queue, reason));
    }

    Ok(entry)
}
