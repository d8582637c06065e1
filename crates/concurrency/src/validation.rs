//! Session validation for OCC
//!
//! Every buffered write carries the version its session observed. A write
//! is valid only if the store still holds that version. Validation checks
//! every write and collects every conflict, so a rolled-back commit can
//! report all stale records at once instead of the first one found.
//!
//! Reads without a write are not validated: a read-only session always
//! commits.

use crate::session::{PendingWrite, Session};
use strata_core::{RecordKey, StrataResult, Version, VersionedStore};

/// A buffered write whose observed version no longer matches the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordConflict {
    /// The stale record
    pub key: RecordKey,
    /// Version the session based its write on
    pub observed: Version,
    /// Version the store holds now
    pub current: Version,
}

impl RecordConflict {
    /// Check if another session created the record after this one saw it absent
    pub fn is_concurrent_insert(&self) -> bool {
        self.observed.is_zero()
    }
}

/// Result of validating a session's buffered writes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// Every conflict found, in key order
    pub conflicts: Vec<RecordConflict>,
}

impl ValidationResult {
    /// Create a successful validation result (no conflicts)
    pub fn ok() -> Self {
        Self::default()
    }

    /// Create a validation result with a single conflict
    pub fn conflict(conflict: RecordConflict) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Keys of every conflicting record
    pub fn keys(&self) -> Vec<RecordKey> {
        self.conflicts.iter().map(|c| c.key.clone()).collect()
    }

    /// Consume the result, yielding its conflicts
    pub fn into_conflicts(self) -> Vec<RecordConflict> {
        self.conflicts
    }
}

/// Validate one buffered write against the store
///
/// # Errors
///
/// Returns an error if the store read fails.
pub fn validate_write<S>(
    key: &RecordKey,
    write: &PendingWrite,
    store: &S,
) -> StrataResult<ValidationResult>
where
    S: VersionedStore + ?Sized,
{
    let current = store.current_version(key)?;
    if current == write.observed {
        Ok(ValidationResult::ok())
    } else {
        Ok(ValidationResult::conflict(RecordConflict {
            key: key.clone(),
            observed: write.observed,
            current,
        }))
    }
}

/// Validate every buffered write of a session
///
/// Does not stop at the first conflict. The caller must hold the key locks
/// for the session's write set, otherwise the result may be stale by the
/// time it is acted on.
///
/// # Errors
///
/// Returns an error if a store read fails.
pub fn validate_session<S>(session: &Session, store: &S) -> StrataResult<ValidationResult>
where
    S: VersionedStore + ?Sized,
{
    let mut result = ValidationResult::ok();
    for (key, write) in session.pending_writes() {
        result.merge(validate_write(key, write, store)?);
    }
    Ok(result)
}
