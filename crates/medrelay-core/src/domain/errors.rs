//! Domain error types
//!
//! This module defines the error taxonomy for the synchronization store.
//! Callers are expected to branch on the category: "not found" for point
//! lookups, "invalid state" for operations the current queue or entry type
//! forbids, "invalid argument" for structurally bad inputs, and "store"
//! for wrapped infrastructure failures. Raw driver errors never leave the
//! subsystem; adapters wrap them with operation context before returning.

use thiserror::Error;

/// Errors that can occur in synchronization store operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A point lookup by explicit key found nothing
    #[error("{entity} '{key}' was not found")]
    NotFound {
        /// Entity kind, e.g. "queue entry" or "sync log entry"
        entity: &'static str,
        /// The key that was looked up
        key: String,
    },

    /// Direct enqueue attempted on a dead-letter queue
    ///
    /// Dead-letter entries must arrive via the cross-queue copy operation,
    /// which records their provenance.
    #[error("queue '{queue}' is a dead-letter queue; entries must be moved in, not enqueued")]
    DeadLetterEnqueue {
        /// Name of the rejecting queue
        queue: String,
    },

    /// An already dead-lettered entry was offered to another dead-letter queue
    #[error("entry {entry} is already dead-lettered and cannot be dead-lettered again")]
    AlreadyDeadLettered {
        /// Id of the offending entry
        entry: i64,
    },

    /// A dead-letter move was attempted without a rejection reason
    #[error("moving an entry into dead-letter queue '{queue}' requires a reason")]
    ReasonRequired {
        /// Name of the destination queue
        queue: String,
    },

    /// A pre-commit hook vetoed the enqueue
    #[error("enqueue rejected: {reason}")]
    EnqueueRejected {
        /// Reason supplied by the rejecting hook
        reason: String,
    },

    /// An argument was structurally invalid (null, empty, zero-valued)
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument {
        /// Name of the offending argument
        name: &'static str,
        /// What was wrong with it
        message: String,
    },

    /// No codec is registered for a payload's resource type
    #[error("no codec registered for resource type '{resource_type}'")]
    UnknownResourceType {
        /// The unresolvable type discriminator
        resource_type: String,
    },

    /// Payload encoding or decoding failed
    #[error("codec failure for resource type '{resource_type}': {message}")]
    Codec {
        /// Resource type being encoded or decoded
        resource_type: String,
        /// Underlying codec message
        message: String,
    },

    /// An underlying relational or blob store operation failed
    #[error("storage failure during {operation} on {entity}{}: {source}", key_suffix(.key))]
    Store {
        /// Entity the operation was acting on
        entity: &'static str,
        /// The operation that failed, e.g. "enqueue" or "save"
        operation: &'static str,
        /// Identifying key, when one was available
        key: Option<String>,
        /// The wrapped infrastructure error
        #[source]
        source: anyhow::Error,
    },
}

fn key_suffix(key: &Option<String>) -> String {
    match key {
        Some(k) => format!(" '{k}'"),
        None => String::new(),
    }
}

impl SyncError {
    /// Build a not-found error for a point lookup
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        SyncError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Build an invalid-argument error
    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        SyncError::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    /// Wrap an infrastructure error with operation context
    pub fn store(
        entity: &'static str,
        operation: &'static str,
        key: Option<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        SyncError::Store {
            entity,
            operation,
            key,
            source: source.into(),
        }
    }

    /// Returns true if this error is a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    /// Returns true if this error is an invalid-state condition
    ///
    /// Invalid-state errors are never worth retrying unchanged; the
    /// operation is impossible given the current queue or entry type.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            SyncError::DeadLetterEnqueue { .. }
                | SyncError::AlreadyDeadLettered { .. }
                | SyncError::ReasonRequired { .. }
                | SyncError::EnqueueRejected { .. }
        )
    }

    /// Returns true if this error wraps an infrastructure failure
    pub fn is_store_failure(&self) -> bool {
        matches!(self, SyncError::Store { .. })
    }
}
