//! Commit arbitration
//!
//! `CommitArbitrator` owns the commit path for sessions over one shared
//! `VersionedStore`:
//!
//! 1. Lock the session's write keys (sorted, per record)
//! 2. Validate every buffered write against the store, collecting conflicts
//! 3. On any conflict, roll back and report per `ConflictReporting`
//! 4. Otherwise apply each write with `compare_and_write`
//!
//! Step 4 can still fail: a writer that bypasses the arbitrator, or a
//! storage error. Writes already applied are then undone in reverse order
//! by compensating writes that restore the prior value at a new version, and
//! the session rolls back. A reader that saw a half-applied write therefore
//! conflicts on commit.
//!
//! # Memory Ordering
//!
//! The stats counters use Relaxed ordering. They are observational only
//! and never synchronize other memory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error};

use crate::config::ArbitratorConfig;
use crate::conflict::ConflictReport;
use crate::lock_table::KeyLockTable;
use crate::session::Session;
use crate::validation::{validate_session, RecordConflict};
use strata_core::{
    RecordKey, SessionId, StrataError, StrataResult, Value, Version,
    VersionedStore, WriteOutcome,
};

/// Error type for commit failures
#[derive(Debug, Clone, Error)]
pub enum CommitError {
    /// One or more records moved since the session observed them
    #[error("{0}")]
    Conflict(ConflictReport),

    /// Session was not in a state that can commit
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The store failed during validation or apply
    #[error("Storage error during commit: {0}")]
    Storage(StrataError),
}

impl CommitError {
    /// Conflict report, if the commit lost a race
    pub fn conflict_report(&self) -> Option<&ConflictReport> {
        match self {
            CommitError::Conflict(report) => Some(report),
            _ => None,
        }
    }

    /// Check if the commit failed on stale records
    pub fn is_conflict(&self) -> bool {
        matches!(self, CommitError::Conflict(_))
    }
}

impl From<CommitError> for StrataError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::Conflict(report) => StrataError::Conflict {
                keys: report.keys(),
                message: report.message(),
            },
            CommitError::InvalidState(state) => StrataError::invalid_input(state),
            CommitError::Storage(err) => err,
        }
    }
}

/// One write the commit applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedWrite {
    /// Record written
    pub key: RecordKey,
    /// Version the record now holds
    pub version: Version,
    /// Whether the write was a delete
    pub deleted: bool,
}

/// Result of a successful commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Session that committed
    pub session: SessionId,
    /// Every write applied, in key order
    pub applied: Vec<AppliedWrite>,
}

impl CommitOutcome {
    /// New version of `key`, if this commit wrote it
    pub fn version_of(&self, key: &RecordKey) -> Option<Version> {
        self.applied
            .iter()
            .find(|w| &w.key == key)
            .map(|w| w.version)
    }

    /// Number of writes applied
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    /// Check if the commit wrote nothing (read-only session)
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Arbitrator statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbitratorStats {
    /// Sessions begun and not yet finished
    pub active: u64,
    /// Sessions begun
    pub started: u64,
    /// Sessions committed
    pub committed: u64,
    /// Sessions rolled back, explicitly or on conflict
    pub rolled_back: u64,
    /// Stale records reported across all rolled-back commits
    pub conflicting_records: u64,
}

impl ArbitratorStats {
    /// Commit success rate (committed / started)
    pub fn commit_rate(&self) -> f64 {
        if self.started > 0 {
            self.committed as f64 / self.started as f64
        } else {
            0.0
        }
    }
}

enum ApplyFailure {
    Conflict(RecordConflict),
    Storage(StrataError),
}

struct UndoEntry {
    key: RecordKey,
    applied: Version,
    prior: Option<Value>,
}

/// Decides commit or rollback for sessions over a shared store
pub struct CommitArbitrator<S: VersionedStore> {
    store: Arc<S>,
    locks: KeyLockTable,
    config: ArbitratorConfig,
    next_session_id: AtomicU64,
    active: AtomicU64,
    started: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    conflicting_records: AtomicU64,
}

impl<S: VersionedStore> CommitArbitrator<S> {
    /// Create an arbitrator over `store`
    pub fn new(store: Arc<S>, config: ArbitratorConfig) -> Self {
        CommitArbitrator {
            store,
            locks: KeyLockTable::new(),
            config,
            next_session_id: AtomicU64::new(1),
            active: AtomicU64::new(0),
            started: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
            conflicting_records: AtomicU64::new(0),
        }
    }

    /// Create an arbitrator with the default (batched) configuration
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, ArbitratorConfig::default())
    }

    /// The shared store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Active configuration
    pub fn config(&self) -> &ArbitratorConfig {
        &self.config
    }

    /// Begin a session
    pub fn begin(&self) -> Session {
        let id = SessionId::new(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        self.started.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
        debug!(target: "strata::occ", session = %id, "Session started");
        Session::with_write_limit(id, self.config.max_pending_writes)
    }

    /// Load a record into `session` from the shared store
    pub fn load(&self, session: &mut Session, key: &RecordKey) -> StrataResult<Option<Value>> {
        session.load(self.store.as_ref(), key)
    }

    /// Commit a session, all or nothing
    ///
    /// On success every buffered write is visible and each record moved to
    /// its observed version + 1. On failure nothing the session buffered is
    /// visible and the session is rolled back.
    ///
    /// # Errors
    /// - `CommitError::Conflict` if any written record moved since it was observed
    /// - `CommitError::InvalidState` if the session is not active
    /// - `CommitError::Storage` if the store failed
    pub fn try_commit(&self, session: &mut Session) -> Result<CommitOutcome, CommitError> {
        if let Err(e) = session.mark_committing() {
            return Err(CommitError::InvalidState(e.to_string()));
        }
        let id = session.id();

        if session.is_read_only() {
            self.finish_commit(session)?;
            debug!(target: "strata::occ", session = %id, "Read-only session committed");
            return Ok(CommitOutcome {
                session: id,
                applied: Vec::new(),
            });
        }

        let write_keys = session.write_keys();
        let guard = self.locks.lock_all(&write_keys);

        let validation = match validate_session(session, self.store.as_ref()) {
            Ok(v) => v,
            Err(e) => {
                drop(guard);
                return Err(self.fail_storage(session, e));
            }
        };

        if !validation.is_valid() {
            drop(guard);
            return Err(self.reject(session, validation.into_conflicts()));
        }

        let applied = self.apply(session);
        drop(guard);

        match applied {
            Ok(applied) => {
                self.finish_commit(session)?;
                debug!(
                    target: "strata::occ",
                    session = %id,
                    writes = applied.len(),
                    "Session committed"
                );
                Ok(CommitOutcome {
                    session: id,
                    applied,
                })
            }
            Err(ApplyFailure::Conflict(conflict)) => Err(self.reject(session, vec![conflict])),
            Err(ApplyFailure::Storage(e)) => Err(self.fail_storage(session, e)),
        }
    }

    /// Roll back an active session, discarding its buffered writes
    ///
    /// # Errors
    /// Returns `StrataError::SessionNotActive` if the session already
    /// committed or rolled back.
    pub fn rollback(&self, session: &mut Session, reason: impl Into<String>) -> StrataResult<()> {
        session.mark_rolled_back(reason.into())?;
        self.record_rollback(0);
        debug!(target: "strata::occ", session = %session.id(), "Session rolled back");
        Ok(())
    }

    /// Snapshot of the arbitrator counters
    pub fn stats(&self) -> ArbitratorStats {
        ArbitratorStats {
            active: self.active.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            conflicting_records: self.conflicting_records.load(Ordering::Relaxed),
        }
    }

    /// Apply every buffered write, undoing on the first failure
    ///
    /// Caller must hold the key locks for the session's write set.
    fn apply(&self, session: &Session) -> Result<Vec<AppliedWrite>, ApplyFailure> {
        let mut undo: Vec<UndoEntry> = Vec::new();
        let mut applied = Vec::new();

        for (key, write) in session.pending_writes() {
            let prior = match self.store.read(key) {
                Ok(prior) => prior,
                Err(e) => {
                    self.undo(session.id(), undo);
                    return Err(ApplyFailure::Storage(e));
                }
            };
            if prior.version != write.observed {
                self.undo(session.id(), undo);
                return Err(ApplyFailure::Conflict(RecordConflict {
                    key: key.clone(),
                    observed: write.observed,
                    current: prior.version,
                }));
            }

            match self
                .store
                .compare_and_write(key, write.observed, write.op.value().cloned())
            {
                Ok(WriteOutcome::Applied { version }) => {
                    undo.push(UndoEntry {
                        key: key.clone(),
                        applied: version,
                        prior: prior.value,
                    });
                    applied.push(AppliedWrite {
                        key: key.clone(),
                        version,
                        deleted: write.op.is_delete(),
                    });
                }
                Ok(WriteOutcome::VersionMismatch { current }) => {
                    self.undo(session.id(), undo);
                    return Err(ApplyFailure::Conflict(RecordConflict {
                        key: key.clone(),
                        observed: write.observed,
                        current,
                    }));
                }
                Err(e) => {
                    self.undo(session.id(), undo);
                    return Err(ApplyFailure::Storage(e));
                }
            }
        }

        Ok(applied)
    }

    fn undo(&self, session: SessionId, undo: Vec<UndoEntry>) {
        for entry in undo.into_iter().rev() {
            match self.store.revert(&entry.key, entry.applied, entry.prior) {
                Ok(Some(version)) => debug!(
                    target: "strata::occ",
                    session = %session,
                    key = %entry.key,
                    version = %version,
                    "Undid applied write"
                ),
                Ok(None) => error!(
                    target: "strata::occ",
                    session = %session,
                    key = %entry.key,
                    "Record moved past {} before it could be reverted",
                    entry.applied
                ),
                Err(e) => error!(
                    target: "strata::occ",
                    session = %session,
                    key = %entry.key,
                    error = %e,
                    "Failed to revert applied write"
                ),
            }
        }
    }

    fn reject(&self, session: &mut Session, conflicts: Vec<RecordConflict>) -> CommitError {
        let report = ConflictReport::new(session.id(), conflicts, self.config.conflict_reporting);
        report.log();
        session.abort_commit(report.message());
        self.record_rollback(report.len() as u64);
        CommitError::Conflict(report)
    }

    fn fail_storage(&self, session: &mut Session, e: StrataError) -> CommitError {
        error!(target: "strata::occ", session = %session.id(), error = %e, "Commit failed");
        session.abort_commit(format!("storage failure: {}", e));
        self.record_rollback(0);
        CommitError::Storage(e)
    }

    fn finish_commit(&self, session: &mut Session) -> Result<(), CommitError> {
        session
            .mark_committed()
            .map_err(|e| CommitError::InvalidState(e.to_string()))?;
        self.committed.fetch_add(1, Ordering::Relaxed);
        self.leave();
        Ok(())
    }

    fn record_rollback(&self, conflicts: u64) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
        self.conflicting_records
            .fetch_add(conflicts, Ordering::Relaxed);
        self.leave();
    }

    fn leave(&self) {
        // Sessions built outside `begin` were never counted as active
        let _ = self
            .active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }
}

impl<S: VersionedStore> std::fmt::Debug for CommitArbitrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitArbitrator")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
