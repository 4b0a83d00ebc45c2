//! Synchronization queue port (driven/secondary port)
//!
//! A queue is a named, pattern-typed FIFO store of pending synchronization
//! work. The trait methods return the typed [`SyncError`] taxonomy rather
//! than an opaque error so callers can pick a retry strategy per category:
//! not-found and empty-queue conditions are cheap to ignore, invalid-state
//! errors will never succeed on retry, and storage failures are transient.

use chrono::{DateTime, Utc};

use crate::domain::{
    CorrelationKey, EntryId, QueueEntry, QueueKey, QueuePattern, SyncError, SyncOperation,
    SyncPayload,
};

/// Filter criteria for querying queue entries
///
/// All fields are optional; when `None`, no filtering is applied for that
/// field. Multiple filters are combined with AND logic. Queries are always
/// implicitly restricted to the queue they are issued against.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Filter by the logical record identity
    pub correlation_key: Option<CorrelationKey>,
    /// Filter by resource type discriminator
    pub resource_type: Option<String>,
    /// Filter by operation kind
    pub operation: Option<SyncOperation>,
    /// Entries created at or after this time
    pub created_after: Option<DateTime<Utc>>,
    /// Entries created before this time
    pub created_before: Option<DateTime<Utc>>,
    /// Filter by dead-letter presence
    pub dead_lettered: Option<bool>,
}

impl EntryFilter {
    /// Creates a new empty filter (matches all entries of the queue)
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the correlation key filter
    pub fn with_correlation_key(mut self, key: CorrelationKey) -> Self {
        self.correlation_key = Some(key);
        self
    }

    /// Sets the resource type filter
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Sets the operation filter
    pub fn with_operation(mut self, operation: SyncOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Sets the lower creation-time bound (inclusive)
    pub fn with_created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    /// Sets the upper creation-time bound (exclusive)
    pub fn with_created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    /// Restricts to dead-lettered entries (`true`) or ordinary ones (`false`)
    pub fn with_dead_lettered(mut self, dead_lettered: bool) -> Self {
        self.dead_lettered = Some(dead_lettered);
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.correlation_key.is_none()
            && self.resource_type.is_none()
            && self.operation.is_none()
            && self.created_after.is_none()
            && self.created_before.is_none()
            && self.dead_lettered.is_none()
    }
}

/// Port trait for a durable synchronization queue
#[async_trait::async_trait]
pub trait SyncQueue: Send + Sync {
    /// The queue's unique, case-insensitively matched name
    fn name(&self) -> &str;

    /// The queue's persistent key
    fn key(&self) -> &QueueKey;

    /// The queue's pattern classification
    fn pattern(&self) -> QueuePattern;

    /// Serializes a payload and appends it to the queue
    ///
    /// The payload's correlation key is used when present; otherwise a
    /// fresh one is assigned. Ids are assigned in strictly increasing
    /// insertion order, which is the FIFO contract for `peek`/`dequeue`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::DeadLetterEnqueue`] if this is a dead-letter queue
    /// - [`SyncError::EnqueueRejected`] if a pre-commit hook vetoed it
    /// - [`SyncError::UnknownResourceType`] if no codec covers the payload
    async fn enqueue(
        &self,
        payload: SyncPayload,
        operation: SyncOperation,
    ) -> Result<QueueEntry, SyncError>;

    /// Copies an entry from another queue into this one
    ///
    /// The source entry is left untouched; callers wanting a true move must
    /// delete the source afterwards. The payload blob is shared, not
    /// re-serialized. When this queue is dead-letter patterned, `reason` is
    /// required and the entry's provenance (original queue, reason) is
    /// recorded alongside an incremented retry count.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ReasonRequired`] if this is a dead-letter queue and
    ///   no reason was given
    /// - [`SyncError::AlreadyDeadLettered`] if the entry is dead-lettered
    ///   and this queue is dead-letter patterned too
    async fn enqueue_entry(
        &self,
        entry: &QueueEntry,
        reason: Option<&str>,
    ) -> Result<QueueEntry, SyncError>;

    /// Removes and returns the head entry, payload loaded
    ///
    /// Returns `Ok(None)` when the queue is empty; never blocks waiting for
    /// work. The payload blob is removed when no other entry references it.
    async fn dequeue(&self) -> Result<Option<QueueEntry>, SyncError>;

    /// Returns the head entry, payload loaded, without removing it
    async fn peek(&self) -> Result<Option<QueueEntry>, SyncError>;

    /// Point lookup of an entry in this queue by id
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if the id does not exist here.
    async fn get(&self, id: EntryId) -> Result<QueueEntry, SyncError>;

    /// Removes a specific entry (not necessarily the head) by id
    ///
    /// Applies the same shared-blob reference check as `dequeue`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if the id does not exist here.
    async fn delete(&self, id: EntryId) -> Result<(), SyncError>;

    /// Queries this queue's entries, returning a materialized result set
    ///
    /// An empty result is not an error. Payloads are not loaded.
    async fn query(&self, filter: &EntryFilter) -> Result<Vec<QueueEntry>, SyncError>;

    /// Number of entries currently in the queue
    async fn count(&self) -> Result<u64, SyncError>;
}
