//! Record version counter
//!
//! Every record carries a `Version`. It starts at `Version::ZERO` (never
//! written), becomes 1 on first insert and grows by exactly one on every
//! committed put or delete. Deletes keep their version in a tombstone, so a
//! record that is deleted and re-inserted keeps counting.
//!
//! ## Invariants
//!
//! - Versions are monotonically increasing within a record
//! - A committed write moves a record from `v` to `v.next()`, never further

use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-record version counter used for optimistic concurrency control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a record that has never been written
    pub const ZERO: Version = Version(0);

    /// Version assigned by the first committed insert
    pub const INITIAL: Version = Version(1);

    /// Wrap a raw counter value
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Version(raw)
    }

    /// Get the numeric value
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Check if the record was never written
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The version a committed write produces from this one
    ///
    /// Saturates at `u64::MAX`; a record cannot realistically get there.
    #[inline]
    pub const fn next(&self) -> Self {
        Version(self.0.saturating_add(1))
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::ZERO
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(raw: u64) -> Self {
        Version(raw)
    }
}

impl From<Version> for u64 {
    fn from(v: Version) -> Self {
        v.0
    }
}
