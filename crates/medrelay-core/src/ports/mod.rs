//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`SyncQueue`] - A named FIFO queue of pending synchronization work
//! - [`SyncLog`] - Checkpoint bookkeeping for incremental pulls
//! - [`BlobStore`] - Content-addressed storage for serialized payloads
//! - [`PayloadCodec`] / [`PayloadCodecRegistry`] - Payload serialization
//! - [`EnqueueHook`] - Pre/post-commit interception of enqueue operations

pub mod blob_store;
pub mod codec;
pub mod hooks;
pub mod sync_log;
pub mod sync_queue;

pub use blob_store::BlobStore;
pub use codec::{JsonPayloadCodec, PayloadCodec, PayloadCodecRegistry};
pub use hooks::{EnqueueHook, HookDecision};
pub use sync_log::SyncLog;
pub use sync_queue::{EntryFilter, SyncQueue};
