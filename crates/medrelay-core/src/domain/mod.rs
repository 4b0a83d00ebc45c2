//! Domain entities and business logic
//!
//! This module contains the core domain types for MedRelay:
//! - Newtypes for type-safe identifiers
//! - Queue entry and dead-letter types
//! - Queue pattern bitflags
//! - Synchronization log (checkpoint) records
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod operation;
pub mod pattern;
pub mod queue_entry;
pub mod sync_log;

// Re-export commonly used types
pub use errors::SyncError;
pub use newtypes::{BlobKey, CorrelationKey, EntryId, QueueKey};
pub use operation::SyncOperation;
pub use pattern::QueuePattern;
pub use queue_entry::{DeadLetterInfo, QueueEntry, SyncPayload};
pub use sync_log::SyncLogEntry;
