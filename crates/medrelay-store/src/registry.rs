//! Queue registry (the synchronization manager)
//!
//! The registry reads every provisioned queue row once at startup and
//! holds one [`SqliteSyncQueue`] per row for the process lifetime. It is an
//! explicit object passed by reference to consumers rather than process
//! globals, so tests can fabricate registries freely. It also owns the
//! checkpoint store for the same database.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::{Row, SqlitePool};

use chrono::Utc;

use medrelay_core::config::QueueDefinition;
use medrelay_core::domain::{QueueKey, QueuePattern, SyncError};
use medrelay_core::ports::{BlobStore, EnqueueHook, PayloadCodecRegistry, SyncQueue};

use crate::log::SqliteSyncLog;
use crate::queue::SqliteSyncQueue;

/// Process-lifetime registry of synchronization queues
pub struct SyncQueueRegistry {
    /// Queues keyed by lowercased name
    queues: HashMap<String, Arc<SqliteSyncQueue>>,
    log: SqliteSyncLog,
}

impl SyncQueueRegistry {
    /// Inserts any missing queue rows from the configured definitions
    ///
    /// Idempotent install step: existing queues (matched by name,
    /// case-insensitively) are left untouched. Returns the number of
    /// queues created.
    pub async fn provision(
        pool: &SqlitePool,
        definitions: &[QueueDefinition],
    ) -> Result<u64, SyncError> {
        let mut created = 0;
        for definition in definitions {
            let pattern = definition.parsed_pattern()?;
            let result = sqlx::query(
                "INSERT OR IGNORE INTO sync_queues (key, name, pattern, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(QueueKey::new().to_string())
            .bind(&definition.name)
            .bind(i64::from(pattern.bits()))
            .bind(Utc::now().to_rfc3339())
            .execute(pool)
            .await
            .map_err(|e| SyncError::store("queue", "provision", Some(definition.name.clone()), e))?;

            if result.rows_affected() > 0 {
                tracing::info!(queue = definition.name, pattern = %pattern, "Queue provisioned");
                created += 1;
            }
        }
        Ok(created)
    }

    /// Loads every persisted queue definition and builds the registry
    ///
    /// The resulting queue set is immutable for the process lifetime; new
    /// queues only appear after a restart following `provision`.
    pub async fn load(
        pool: SqlitePool,
        blobs: Arc<dyn BlobStore>,
        codecs: Arc<PayloadCodecRegistry>,
        hooks: Vec<Arc<dyn EnqueueHook>>,
    ) -> Result<Self, SyncError> {
        let rows = sqlx::query("SELECT key, name, pattern FROM sync_queues ORDER BY name")
            .fetch_all(&pool)
            .await
            .map_err(|e| SyncError::store("queue", "load", None, e))?;

        let mut queues = HashMap::with_capacity(rows.len());
        for row in &rows {
            let key_str: String = row.get("key");
            let name: String = row.get("name");
            let pattern_bits: i64 = row.get("pattern");

            let key = QueueKey::from_str(&key_str)?;
            let pattern = QueuePattern::from_bits(pattern_bits as u8)?;

            let queue = Arc::new(SqliteSyncQueue::new(
                pool.clone(),
                key,
                name.clone(),
                pattern,
                Arc::clone(&blobs),
                Arc::clone(&codecs),
                hooks.clone(),
            ));
            queues.insert(name.to_lowercase(), queue);
        }

        tracing::info!(queues = queues.len(), "Queue registry loaded");

        Ok(Self {
            queues,
            log: SqliteSyncLog::new(pool),
        })
    }

    /// Looks up a queue by name, case-insensitively
    pub fn get(&self, name: &str) -> Option<Arc<SqliteSyncQueue>> {
        self.queues.get(&name.to_lowercase()).cloned()
    }

    /// Returns every queue whose pattern overlaps the requested mask
    ///
    /// Sorted by name for stable iteration order.
    pub fn all(&self, pattern: QueuePattern) -> Vec<Arc<SqliteSyncQueue>> {
        let mut matching: Vec<Arc<SqliteSyncQueue>> = self
            .queues
            .values()
            .filter(|q| q.pattern().matches(pattern))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name().cmp(b.name()));
        matching
    }

    /// Number of loaded queues
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Returns true if no queues are loaded
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// The checkpoint store for this database
    pub fn log(&self) -> &SqliteSyncLog {
        &self.log
    }
}
