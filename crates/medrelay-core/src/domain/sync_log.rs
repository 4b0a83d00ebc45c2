//! Synchronization log (checkpoint) records
//!
//! A checkpoint records how far an incremental pull of one resource type
//! (optionally narrowed by a filter expression) has progressed. The
//! steady-state row of a `(resource_type, filter)` pair carries the last
//! successful sync time and ETag; while a paged pull is in flight an
//! additional row keyed by `query_id` tracks its cursor so the pull can
//! resume after a restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One checkpoint row of the synchronization log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Resource type being pulled, e.g. "Patient"
    resource_type: String,
    /// Filter expression narrowing the pull; empty when unfiltered
    filter: String,
    /// Timestamp of the last successful incremental pull
    last_sync: Option<DateTime<Utc>>,
    /// Opaque caching token from the last pull
    last_etag: Option<String>,
    /// Last failure message; cleared on successful save
    last_error: Option<String>,
    /// Identity of an in-flight paged query, when resuming one
    query_id: Option<Uuid>,
    /// Offset the in-flight query has reached
    query_offset: Option<i64>,
    /// When the in-flight query started
    query_started_at: Option<DateTime<Utc>>,
}

impl SyncLogEntry {
    /// Creates a steady-state checkpoint for a resource type and filter
    pub fn new(resource_type: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            filter: filter.into(),
            last_sync: None,
            last_etag: None,
            last_error: None,
            query_id: None,
            query_offset: None,
            query_started_at: None,
        }
    }

    /// Sets the last successful sync time
    #[must_use]
    pub fn with_last_sync(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_sync = at;
        self
    }

    /// Sets the last known ETag
    #[must_use]
    pub fn with_last_etag(mut self, etag: Option<String>) -> Self {
        self.last_etag = etag;
        self
    }

    /// Sets the last failure message
    #[must_use]
    pub fn with_last_error(mut self, error: Option<String>) -> Self {
        self.last_error = error;
        self
    }

    /// Attaches an in-flight query cursor
    #[must_use]
    pub fn with_query(
        mut self,
        query_id: Uuid,
        offset: i64,
        started_at: DateTime<Utc>,
    ) -> Self {
        self.query_id = Some(query_id);
        self.query_offset = Some(offset);
        self.query_started_at = Some(started_at);
        self
    }

    /// The resource type this checkpoint tracks
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The filter expression; empty when unfiltered
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Timestamp of the last successful incremental pull
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// Opaque caching token from the last pull
    pub fn last_etag(&self) -> Option<&str> {
        self.last_etag.as_deref()
    }

    /// Last failure message, if the most recent pull failed
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Identity of the in-flight paged query, when this is a query row
    pub fn query_id(&self) -> Option<Uuid> {
        self.query_id
    }

    /// Offset the in-flight query has reached
    pub fn query_offset(&self) -> Option<i64> {
        self.query_offset
    }

    /// When the in-flight query started
    pub fn query_started_at(&self) -> Option<DateTime<Utc>> {
        self.query_started_at
    }

    /// Returns true if this row tracks an in-flight paged query
    pub fn is_query_row(&self) -> bool {
        self.query_id.is_some()
    }
}
