//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for queue and blob
//! identifiers. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::SyncError;

// ============================================================================
// Sequence-based ID types
// ============================================================================

/// Identifier of a queue entry, assigned by the database sequence
///
/// Entry ids are strictly increasing in insertion order; the lowest
/// surviving id is the head of its queue. This is the FIFO contract that
/// `peek` and `dequeue` rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    /// Create an EntryId from a raw database value
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw sequence value
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl Display for EntryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier of a synchronization queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueKey(Uuid);

impl QueueKey {
    /// Create a new random QueueKey
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a QueueKey from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QueueKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QueueKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self).map_err(|e| {
            SyncError::invalid_argument("queue_key", format!("invalid UUID: {e}"))
        })
    }
}

impl From<Uuid> for QueueKey {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Logical identity of the domain record a queue entry represents
///
/// Distinct from the entry's own sequence id: several queue entries (for
/// example the original and its dead-letter copy) may carry the same
/// correlation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(Uuid);

impl CorrelationKey {
    /// Create a new random CorrelationKey
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a CorrelationKey from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelationKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self).map_err(|e| {
            SyncError::invalid_argument("correlation_key", format!("invalid UUID: {e}"))
        })
    }
}

impl From<Uuid> for CorrelationKey {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Blob store key
// ============================================================================

/// Opaque key into the blob store holding a serialized payload
///
/// The queue subsystem never interprets the key beyond equality; the
/// filesystem adapter produces lowercase hex digests, so construction
/// validates that shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobKey(String);

impl BlobKey {
    /// Create a BlobKey, validating it is non-empty lowercase hex
    pub fn new(key: impl Into<String>) -> Result<Self, SyncError> {
        let key = key.into();
        if key.is_empty() {
            return Err(SyncError::invalid_argument("blob_key", "must not be empty"));
        }
        if !key.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(SyncError::invalid_argument(
                "blob_key",
                format!("expected lowercase hex, got '{key}'"),
            ));
        }
        Ok(Self(key))
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BlobKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlobKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_id_ordering() {
        assert!(EntryId::new(1) < EntryId::new(2));
        assert_eq!(EntryId::new(7).value(), 7);
    }

    #[test]
    fn test_queue_key_round_trip() {
        let key = QueueKey::new();
        let parsed: QueueKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_queue_key_rejects_garbage() {
        assert!("not-a-uuid".parse::<QueueKey>().is_err());
    }

    #[test]
    fn test_correlation_key_round_trip() {
        let key = CorrelationKey::new();
        let parsed: CorrelationKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_blob_key_validation() {
        assert!(BlobKey::new("abc123").is_ok());
        assert!(BlobKey::new("").is_err());
        assert!(BlobKey::new("ABC123").is_err());
        assert!(BlobKey::new("zzz").is_err());
    }

    #[test]
    fn test_blob_key_serde_transparent() {
        let key = BlobKey::new("deadbeef").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"deadbeef\"");
    }
}
