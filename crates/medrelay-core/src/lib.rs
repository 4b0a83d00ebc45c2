//! MedRelay Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `QueueEntry`, `SyncPayload`, `SyncLogEntry`, `QueuePattern`
//! - **Port definitions** - Traits for adapters: `SyncQueue`, `SyncLog`, `BlobStore`,
//!   `PayloadCodec`, `EnqueueHook`
//! - **Error taxonomy** - `SyncError` distinguishing not-found, invalid-state,
//!   argument and storage failures
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no storage dependencies.
//! Ports define trait interfaces that adapter crates implement: the SQLite
//! store lives in `medrelay-store`, the filesystem blob store in
//! `medrelay-blob`. A synchronization engine consumes this library; it is not
//! part of this workspace.

pub mod config;
pub mod domain;
pub mod ports;
