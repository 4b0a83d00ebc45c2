//! Synchronization operation kinds

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::SyncError;

/// The change a queue entry carries against its domain record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// A new record to be created on the remote side
    Insert,
    /// An update to an existing record
    Update,
    /// A deletion of an existing record
    Delete,
}

impl SyncOperation {
    /// Returns the operation name as stored in the database
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Insert => "insert",
            SyncOperation::Update => "update",
            SyncOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncOperation {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(SyncOperation::Insert),
            "update" => Ok(SyncOperation::Update),
            "delete" => Ok(SyncOperation::Delete),
            other => Err(SyncError::invalid_argument(
                "operation",
                format!("unknown operation '{other}'"),
            )),
        }
    }
}
