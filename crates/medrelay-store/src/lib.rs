//! MedRelay Store - SQLite queue and checkpoint persistence
//!
//! SQLite-based store for:
//! - Named synchronization queues with dead-letter provenance
//! - FIFO queue entries referencing blob-stored payloads
//! - Synchronization log checkpoints and resumable query cursors
//!
//! ## Architecture
//!
//! This crate implements the `SyncQueue` and `SyncLog` ports from
//! `medrelay-core` using SQLite as the storage backend. It is a driven
//! (secondary) adapter in the hexagonal architecture; the blob store it
//! writes payloads through is itself a port, so any `BlobStore`
//! implementation plugs in.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteSyncQueue`] - One durable queue, FIFO by insertion id
//! - [`SqliteSyncLog`] - Checkpoint store for incremental pulls
//! - [`SyncQueueRegistry`] - Loads every provisioned queue at startup and
//!   resolves them by name or pattern for the process lifetime
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use medrelay_store::{DatabasePool, SyncQueueRegistry};
//! use medrelay_core::ports::PayloadCodecRegistry;
//! use medrelay_blob::FsBlobStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/medrelay/store.db")).await?;
//! let blobs = Arc::new(FsBlobStore::new("/var/lib/medrelay/blobs"));
//! let codecs = Arc::new(PayloadCodecRegistry::with_json_types(["Patient"]));
//! let registry =
//!     SyncQueueRegistry::load(pool.pool().clone(), blobs, codecs, Vec::new()).await?;
//! let outbound = registry.get("outbound-main");
//! # Ok(())
//! # }
//! ```

pub mod log;
pub mod pool;
pub mod queue;
pub mod registry;

pub use log::SqliteSyncLog;
pub use pool::DatabasePool;
pub use queue::SqliteSyncQueue;
pub use registry::SyncQueueRegistry;

/// Errors that can occur while opening or migrating the database
///
/// Once a pool exists, individual queue and log operations report through
/// the `SyncError` taxonomy from `medrelay-core` instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}
