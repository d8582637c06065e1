//! Core trait for the shared record table
//!
//! `VersionedStore` is the seam between the concurrency layer and the
//! storage layer: atomic versioned reads and versioned conditional writes.
//! The arbitrator never touches storage any other way, so alternative
//! backends only need to honor the per-key atomicity described below.

use crate::contract::{Timestamp, Version, Versioned, VersionedValue};
use crate::error::StrataResult;
use crate::types::RecordKey;
use crate::value::Value;

/// State of one record slot as seen by an atomic read
///
/// `value` is `None` for a record that was never written (version
/// `Version::ZERO`) and for a tombstone left by a delete (version of the
/// delete).
pub type RecordSlot = Versioned<Option<Value>>;

/// Slot returned for a key that has never been written
pub fn empty_slot() -> RecordSlot {
    Versioned::with_timestamp(None, Version::ZERO, Timestamp::EPOCH)
}

/// Result of a versioned conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record was at the expected version; the write now holds `version`
    Applied {
        /// Version assigned to the write (`expected.next()`)
        version: Version,
    },
    /// The record had moved; nothing was written
    VersionMismatch {
        /// Version found in the store
        current: Version,
    },
}

impl WriteOutcome {
    /// Check if the write was applied
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied { .. })
    }
}

/// Key-value record store with atomic versioned reads and conditional writes
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads. Each call must be atomic with respect to its key:
/// `compare_and_write` compares and increments in one step, so no other
/// writer can slip between the comparison and the increment.
pub trait VersionedStore: Send + Sync {
    /// Atomically read a record's value and version
    ///
    /// Never-written keys return [`empty_slot`]; tombstones return
    /// `value: None` with the delete's version.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn read(&self, key: &RecordKey) -> StrataResult<RecordSlot>;

    /// Write `value` (or a tombstone for `None`) if the record is at `expected`
    ///
    /// On success the record moves to `expected.next()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. A version mismatch is
    /// not an error; it is reported as [`WriteOutcome::VersionMismatch`].
    fn compare_and_write(
        &self,
        key: &RecordKey,
        expected: Version,
        value: Option<Value>,
    ) -> StrataResult<WriteOutcome>;

    /// Undo a write this caller applied with a compensating write
    ///
    /// Writes `prior` (a tombstone for `None`) on top of `applied`, moving the
    /// record to `applied.next()`. Versions never go backwards.
    ///
    /// Returns the compensating version, or `None` (changing nothing) if
    /// someone wrote after us.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn revert(
        &self,
        key: &RecordKey,
        applied: Version,
        prior: Option<Value>,
    ) -> StrataResult<Option<Version>> {
        Ok(match self.compare_and_write(key, applied, prior)? {
            WriteOutcome::Applied { version } => Some(version),
            WriteOutcome::VersionMismatch { .. } => None,
        })
    }

    /// Number of live (non-tombstone) records
    fn record_count(&self) -> usize;

    /// Current value for key, hiding tombstones
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &RecordKey) -> StrataResult<Option<VersionedValue>> {
        let slot = self.read(key)?;
        let Versioned {
            value,
            version,
            timestamp,
        } = slot;
        Ok(value.map(|v| Versioned::with_timestamp(v, version, timestamp)))
    }

    /// Current version for key (`Version::ZERO` if never written)
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn current_version(&self, key: &RecordKey) -> StrataResult<Version> {
        Ok(self.read(key)?.version)
    }
}
