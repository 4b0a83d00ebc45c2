//! Blob store port (driven/secondary port)
//!
//! Content-addressed storage for serialized queue payloads, keyed by an
//! opaque identifier. The queue subsystem may hold several independent
//! references to one key (a dead-letter copy reuses the original's blob),
//! and only calls [`BlobStore::remove`] after confirming by query that no
//! surviving entry still references the key. Implementations therefore need
//! no reference counting of their own, and `remove` of an absent key must
//! be a harmless no-op.
//!
//! The blob store is not transactional with the relational store;
//! compensating deletes on partial failure are best-effort.

use crate::domain::{BlobKey, SyncError};

/// Port trait for content-addressed payload storage
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the given bytes and returns their key
    ///
    /// Storing identical content twice returns the same key; the second
    /// store is a no-op.
    async fn add(&self, data: &[u8]) -> Result<BlobKey, SyncError>;

    /// Retrieves the bytes stored under `key`
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if no blob exists under the key.
    async fn get(&self, key: &BlobKey) -> Result<Vec<u8>, SyncError>;

    /// Removes the blob stored under `key`; no-op if absent
    async fn remove(&self, key: &BlobKey) -> Result<(), SyncError>;
}
