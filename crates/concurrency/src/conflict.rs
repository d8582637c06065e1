//! Conflict reporting
//!
//! A rolled-back commit produces a `ConflictReport` holding every stale
//! record. How the report surfaces depends on `ConflictReporting`:
//!
//! - `Batched`: one `OptimisticLockError::Batch` and one warning
//! - `PerRecord`: one `OptimisticLockError::Record` and one warning per row
//!
//! Either way the report keeps the full per-record detail.

use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::config::ConflictReporting;
use crate::validation::RecordConflict;
use strata_core::{RecordKey, SessionId, Version};

/// Caller-facing optimistic lock failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OptimisticLockError {
    /// One stale record
    #[error("Optimistic lock failure on {key}: observed {observed}, store holds {current}")]
    Record {
        /// The stale record
        key: RecordKey,
        /// Version the session based its write on
        observed: Version,
        /// Version the store holds
        current: Version,
    },

    /// Several stale records folded into one failure
    #[error(
        "Suppressing {} optimistic lock failure(s) in one batch: {}",
        .keys.len(),
        join_keys(.keys)
    )]
    Batch {
        /// Every stale record
        keys: Vec<RecordKey>,
    },
}

impl OptimisticLockError {
    /// Keys covered by this failure
    pub fn keys(&self) -> Vec<RecordKey> {
        match self {
            OptimisticLockError::Record { key, .. } => vec![key.clone()],
            OptimisticLockError::Batch { keys } => keys.clone(),
        }
    }
}

impl From<&RecordConflict> for OptimisticLockError {
    fn from(c: &RecordConflict) -> Self {
        OptimisticLockError::Record {
            key: c.key.clone(),
            observed: c.observed,
            current: c.current,
        }
    }
}

fn join_keys(keys: &[RecordKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every conflict that rolled back one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictReport {
    session: SessionId,
    conflicts: Vec<RecordConflict>,
    reporting: ConflictReporting,
}

impl ConflictReport {
    /// Build a report for `session`
    pub fn new(
        session: SessionId,
        conflicts: Vec<RecordConflict>,
        reporting: ConflictReporting,
    ) -> Self {
        ConflictReport {
            session,
            conflicts,
            reporting,
        }
    }

    /// Session that was rolled back
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// Per-record detail, in key order
    pub fn conflicts(&self) -> &[RecordConflict] {
        &self.conflicts
    }

    /// Keys of every stale record
    pub fn keys(&self) -> Vec<RecordKey> {
        self.conflicts.iter().map(|c| c.key.clone()).collect()
    }

    /// Check if `key` is among the stale records
    pub fn contains_key(&self, key: &RecordKey) -> bool {
        self.conflicts.iter().any(|c| &c.key == key)
    }

    /// Number of stale records
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    /// Check if the report has no conflicts
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Reporting mode the report was built under
    pub fn reporting(&self) -> ConflictReporting {
        self.reporting
    }

    /// Failures as the caller sees them
    ///
    /// One aggregated failure in batched mode, one per record otherwise.
    pub fn failures(&self) -> Vec<OptimisticLockError> {
        match self.reporting {
            ConflictReporting::Batched => vec![OptimisticLockError::Batch { keys: self.keys() }],
            ConflictReporting::PerRecord => self.conflicts.iter().map(Into::into).collect(),
        }
    }

    /// Aggregated human-readable message
    pub fn message(&self) -> String {
        match self.reporting {
            ConflictReporting::Batched => {
                OptimisticLockError::Batch { keys: self.keys() }.to_string()
            }
            ConflictReporting::PerRecord => self
                .conflicts
                .iter()
                .map(|c| OptimisticLockError::from(c).to_string())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// Emit the report as warnings, one per failure
    pub(crate) fn log(&self) {
        match self.reporting {
            ConflictReporting::Batched => {
                warn!(
                    target: "strata::occ",
                    session = %self.session,
                    conflicts = self.conflicts.len(),
                    "{}",
                    self.message()
                );
            }
            ConflictReporting::PerRecord => {
                for c in &self.conflicts {
                    warn!(
                        target: "strata::occ",
                        session = %self.session,
                        key = %c.key,
                        observed = c.observed.as_u64(),
                        current = c.current.as_u64(),
                        "{}",
                        OptimisticLockError::from(c)
                    );
                }
            }
        }
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rolled back: {}", self.session, self.message())
    }
}
