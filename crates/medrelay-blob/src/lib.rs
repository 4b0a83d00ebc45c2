//! MedRelay Blob - Content-addressed payload storage
//!
//! Filesystem implementation of the `BlobStore` port from `medrelay-core`.
//! It is a driven (secondary) adapter in the hexagonal architecture.
//!
//! Payload bytes are stored under their SHA-256 digest in a sharded
//! directory tree, so identical content always resolves to the same key and
//! a cross-queue copy of a queue entry shares the original's file for free.
//! The queue subsystem performs its own reference check before calling
//! `remove`, so this store keeps no counts.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::PathBuf;
//! use medrelay_blob::FsBlobStore;
//! use medrelay_core::ports::BlobStore;
//!
//! # async fn example() -> Result<(), medrelay_core::domain::SyncError> {
//! let store = FsBlobStore::new(PathBuf::from("/var/lib/medrelay/blobs"));
//! let key = store.add(b"serialized payload").await?;
//! let bytes = store.get(&key).await?;
//! # Ok(())
//! # }
//! ```

pub mod store;

pub use store::FsBlobStore;
