//! Synchronization log port (driven/secondary port)
//!
//! Checkpoint bookkeeping for incremental pulls. Each `(resource_type,
//! filter)` pair has at most one steady-state row recording the last
//! successful pull; while a paged pull is in flight, additional rows keyed
//! by `query_id` track its cursor so the pull survives a restart.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{SyncError, SyncLogEntry};

/// Port trait for the synchronization checkpoint store
#[async_trait::async_trait]
pub trait SyncLog: Send + Sync {
    /// Timestamp of the last successful pull for the pair, if any
    async fn last_sync_time(
        &self,
        resource_type: &str,
        filter: &str,
    ) -> Result<Option<DateTime<Utc>>, SyncError>;

    /// ETag of the last successful pull for the pair, if any
    async fn last_etag(
        &self,
        resource_type: &str,
        filter: &str,
    ) -> Result<Option<String>, SyncError>;

    /// Upserts the steady-state checkpoint row
    ///
    /// Clears any recorded error. An empty `etag` does not overwrite a
    /// previously known good one.
    async fn save(
        &self,
        resource_type: &str,
        filter: &str,
        etag: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<(), SyncError>;

    /// Upserts the cursor of an in-flight paged query
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidArgument`] if `query_id` is nil.
    async fn save_query(
        &self,
        resource_type: &str,
        filter: &str,
        query_id: Uuid,
        offset: i64,
    ) -> Result<(), SyncError>;

    /// Marks an in-flight paged query as finished
    ///
    /// The pair's `last_sync`/`last_etag` history is preserved and exactly
    /// one steady-state row remains. Silent no-op when no matching row
    /// exists.
    async fn complete_query(
        &self,
        resource_type: &str,
        filter: &str,
        query_id: Uuid,
    ) -> Result<(), SyncError>;

    /// Finds an in-flight query row for the pair, for resuming after restart
    async fn find_query_data(
        &self,
        resource_type: &str,
        filter: &str,
    ) -> Result<Option<SyncLogEntry>, SyncError>;

    /// Records a failure message on the steady-state row
    ///
    /// No-op when no row exists yet for the pair.
    async fn save_error(
        &self,
        resource_type: &str,
        filter: &str,
        error: &str,
    ) -> Result<(), SyncError>;

    /// Deletes log rows matching the given entry
    ///
    /// An entry carrying a query id deletes exactly that in-flight row;
    /// an entry without one deletes every row for its
    /// `(resource_type, filter)` pair.
    async fn delete(&self, entry: &SyncLogEntry) -> Result<(), SyncError>;

    /// All steady-state checkpoint rows (query rows excluded)
    async fn all(&self) -> Result<Vec<SyncLogEntry>, SyncError>;

    /// Deletes in-flight query rows that started before the cutoff
    ///
    /// Housekeeping for pulls that crashed and will never resume. Returns
    /// the number of rows removed.
    async fn prune_stale_queries(&self, older_than: DateTime<Utc>) -> Result<u64, SyncError>;
}
