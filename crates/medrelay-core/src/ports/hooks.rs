//! Enqueue interception hooks
//!
//! Queues run an ordered list of hooks around each enqueue. Hooks run in
//! registration order; the first rejection wins and the enqueue fails with
//! [`SyncError::EnqueueRejected`] before anything is written. After the row
//! commits, `after_enqueue` is called with the persisted entry.
//!
//! [`SyncError::EnqueueRejected`]: crate::domain::SyncError::EnqueueRejected

use crate::domain::{QueueEntry, SyncOperation, SyncPayload};

/// Verdict of a pre-commit hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    /// Proceed with the enqueue
    Continue,
    /// Veto the enqueue with the given reason
    Reject(String),
}

/// Port trait for intercepting enqueue operations
///
/// Both methods have default implementations, so a hook only interested in
/// notifications can override `after_enqueue` alone.
#[async_trait::async_trait]
pub trait EnqueueHook: Send + Sync {
    /// Called before anything is written; may veto the enqueue
    async fn before_enqueue(
        &self,
        queue: &str,
        payload: &SyncPayload,
        operation: SyncOperation,
    ) -> HookDecision {
        let _ = (queue, payload, operation);
        HookDecision::Continue
    }

    /// Called after the entry row has committed
    async fn after_enqueue(&self, queue: &str, entry: &QueueEntry) {
        let _ = (queue, entry);
    }
}
