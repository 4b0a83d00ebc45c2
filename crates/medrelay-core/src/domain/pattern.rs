//! Queue pattern bitflags
//!
//! A queue's pattern classifies its role in the synchronization pipeline.
//! Patterns combine: a queue provisioned as `OUTBOUND | DEAD_LETTER` is a
//! dead-letter queue for outbound traffic. The registry matches queues
//! against a requested mask by flag overlap, so a request for
//! `INBOUND | DEAD_LETTER` returns every queue carrying either flag.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use super::errors::SyncError;

/// Bitflag classification of a queue's role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueuePattern(u8);

impl QueuePattern {
    /// Holds records arriving from remote peers, pending local application
    pub const INBOUND: Self = Self(0b001);
    /// Holds local changes pending push to remote peers
    pub const OUTBOUND: Self = Self(0b010);
    /// Holds entries that failed processing, annotated with provenance
    pub const DEAD_LETTER: Self = Self(0b100);
    /// Matches every queue
    pub const ALL: Self = Self(0b111);

    /// Construct from raw bits, rejecting unknown flags
    pub fn from_bits(bits: u8) -> Result<Self, SyncError> {
        if bits == 0 || bits & !Self::ALL.0 != 0 {
            return Err(SyncError::invalid_argument(
                "pattern",
                format!("invalid pattern bits 0b{bits:b}"),
            ));
        }
        Ok(Self(bits))
    }

    /// Get the raw flag bits
    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Returns true if every flag of `other` is set on `self`
    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if `self` and `other` share any flag
    ///
    /// This is the wildcard-style match the registry uses for bulk lookup.
    #[must_use]
    pub const fn matches(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if this queue holds dead-lettered entries
    #[must_use]
    pub const fn is_dead_letter(&self) -> bool {
        self.contains(Self::DEAD_LETTER)
    }
}

impl BitOr for QueuePattern {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::str::FromStr for QueuePattern {
    type Err = SyncError;

    /// Parses pipe-separated flag names, e.g. `"outbound|dead_letter"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = 0u8;
        for name in s.split('|') {
            bits |= match name.trim() {
                "inbound" => Self::INBOUND.0,
                "outbound" => Self::OUTBOUND.0,
                "dead_letter" => Self::DEAD_LETTER.0,
                "all" => Self::ALL.0,
                other => {
                    return Err(SyncError::invalid_argument(
                        "pattern",
                        format!("unknown pattern flag '{other}'"),
                    ))
                }
            };
        }
        Self::from_bits(bits)
    }
}

impl fmt::Display for QueuePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::INBOUND) {
            names.push("inbound");
        }
        if self.contains(Self::OUTBOUND) {
            names.push("outbound");
        }
        if self.contains(Self::DEAD_LETTER) {
            names.push("dead_letter");
        }
        write!(f, "{}", names.join("|"))
    }
}
