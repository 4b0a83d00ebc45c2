//! Queue entry domain entities
//!
//! A queue entry is one durable unit of pending synchronization work. The
//! entry row itself carries only metadata; the serialized payload lives in
//! the blob store under `blob_key`. Several entries may share one blob key
//! (a dead-letter copy reuses the original's payload without
//! re-serialization), so blob cleanup is reference-counted by querying for
//! surviving referents rather than by an explicit counter.
//!
//! ## Entry lifecycle
//!
//! ```text
//!    enqueue                    dequeue | delete
//!   ────────► [ queued ] ──────────────────────────► gone
//!                 │
//!                 │ processing failed: copy into dead-letter queue
//!                 ▼
//!          [ dead-lettered ] ── retry: copy into an ordinary queue ──► [ queued ]
//! ```
//!
//! The dead-letter copy leaves the source entry in place; a true move is
//! completed by the caller deleting the source after the copy commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::newtypes::{BlobKey, CorrelationKey, EntryId, QueueKey};
use super::operation::SyncOperation;

/// A domain record in transit, before serialization
///
/// The body is carried as a JSON tree; the codec registered for
/// `resource_type` turns it into the bytes stored in the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPayload {
    resource_type: String,
    correlation_key: Option<CorrelationKey>,
    body: Value,
}

impl SyncPayload {
    /// Creates a payload for the given resource type
    pub fn new(resource_type: impl Into<String>, body: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            correlation_key: None,
            body,
        }
    }

    /// Sets the correlation key identifying the underlying domain record
    ///
    /// When absent, enqueue assigns a fresh random key.
    #[must_use]
    pub fn with_correlation_key(mut self, key: CorrelationKey) -> Self {
        self.correlation_key = Some(key);
        self
    }

    /// The type discriminator used to resolve the payload codec
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The logical identity of the record, if the caller supplied one
    pub fn correlation_key(&self) -> Option<&CorrelationKey> {
        self.correlation_key.as_ref()
    }

    /// The record body as a JSON tree
    pub fn body(&self) -> &Value {
        &self.body
    }
}

/// Provenance attached to an entry residing in a dead-letter queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterInfo {
    /// Key of the queue the entry was moved from
    original_queue: QueueKey,
    /// Why the entry was rejected from normal processing
    reason: String,
}

impl DeadLetterInfo {
    /// Creates dead-letter provenance
    pub fn new(original_queue: QueueKey, reason: impl Into<String>) -> Self {
        Self {
            original_queue,
            reason: reason.into(),
        }
    }

    /// The queue the entry came from
    pub fn original_queue(&self) -> &QueueKey {
        &self.original_queue
    }

    /// The rejection reason
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// One durable unit of queued synchronization work
///
/// The id is assigned by the database on insert, so a freshly built entry
/// carries `None` until the store hands back the persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Sequence id assigned by the database; defines FIFO order
    id: Option<EntryId>,
    /// Owning queue
    queue_key: QueueKey,
    /// Logical identity of the record this entry represents
    correlation_key: CorrelationKey,
    /// The change being synchronized
    operation: SyncOperation,
    /// Type discriminator for deserializing the payload
    resource_type: String,
    /// MIME type of the serialized payload
    content_type: String,
    /// Reference into the blob store holding the serialized payload
    blob_key: BlobKey,
    /// When the entry was inserted
    creation_time: DateTime<Utc>,
    /// Times this entry has been copied into a dead-letter queue
    retry_count: Option<u32>,
    /// Present when the entry resides in a dead-letter queue
    dead_letter: Option<DeadLetterInfo>,
    /// Deserialized payload, populated by `peek` and `dequeue` only
    #[serde(skip)]
    payload: Option<SyncPayload>,
}

impl QueueEntry {
    /// Builds a new entry pending insertion (no id yet)
    pub fn new(
        queue_key: QueueKey,
        correlation_key: CorrelationKey,
        operation: SyncOperation,
        resource_type: impl Into<String>,
        content_type: impl Into<String>,
        blob_key: BlobKey,
    ) -> Self {
        Self {
            id: None,
            queue_key,
            correlation_key,
            operation,
            resource_type: resource_type.into(),
            content_type: content_type.into(),
            blob_key,
            creation_time: Utc::now(),
            retry_count: None,
            dead_letter: None,
            payload: None,
        }
    }

    /// Sets the database-assigned id (used when reading rows back)
    #[must_use]
    pub fn with_id(mut self, id: EntryId) -> Self {
        self.id = Some(id);
        self
    }

    /// Overrides the creation time (used when reading rows back)
    #[must_use]
    pub fn with_creation_time(mut self, at: DateTime<Utc>) -> Self {
        self.creation_time = at;
        self
    }

    /// Sets the retry count
    #[must_use]
    pub fn with_retry_count(mut self, count: Option<u32>) -> Self {
        self.retry_count = count;
        self
    }

    /// Attaches dead-letter provenance
    #[must_use]
    pub fn with_dead_letter(mut self, info: DeadLetterInfo) -> Self {
        self.dead_letter = Some(info);
        self
    }

    /// Attaches the deserialized payload
    #[must_use]
    pub fn with_payload(mut self, payload: SyncPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// The database-assigned sequence id, if persisted
    pub fn id(&self) -> Option<EntryId> {
        self.id
    }

    /// The owning queue's key
    pub fn queue_key(&self) -> &QueueKey {
        &self.queue_key
    }

    /// The logical identity of the record this entry represents
    pub fn correlation_key(&self) -> &CorrelationKey {
        &self.correlation_key
    }

    /// The change being synchronized
    pub fn operation(&self) -> SyncOperation {
        self.operation
    }

    /// Type discriminator for the payload codec
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// MIME type of the serialized payload
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Reference to the serialized payload in the blob store
    pub fn blob_key(&self) -> &BlobKey {
        &self.blob_key
    }

    /// When the entry was inserted
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Times this entry has been copied into a dead-letter queue
    pub fn retry_count(&self) -> Option<u32> {
        self.retry_count
    }

    /// Dead-letter provenance, when the entry is dead-lettered
    pub fn dead_letter(&self) -> Option<&DeadLetterInfo> {
        self.dead_letter.as_ref()
    }

    /// Returns true if this entry resides in a dead-letter queue
    pub fn is_dead_lettered(&self) -> bool {
        self.dead_letter.is_some()
    }

    /// The deserialized payload, when one was loaded
    pub fn payload(&self) -> Option<&SyncPayload> {
        self.payload.as_ref()
    }

    /// Takes ownership of the loaded payload
    pub fn take_payload(&mut self) -> Option<SyncPayload> {
        self.payload.take()
    }

    /// Retry count for a copy of this entry into another queue
    ///
    /// Entering a dead-letter queue always counts as a retry (an entry with
    /// no history starts at 1); a copy between ordinary queues only bumps an
    /// existing count.
    pub fn next_retry_count(&self, into_dead_letter: bool) -> Option<u32> {
        match (into_dead_letter, self.retry_count) {
            (true, existing) => Some(existing.unwrap_or(0) + 1),
            (false, Some(n)) => Some(n + 1),
            (false, None) => None,
        }
    }
}
