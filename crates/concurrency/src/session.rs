//! Session context for OCC
//!
//! A session is one unit of work. It loads records through a
//! `VersionedStore`, keeps its own snapshot of every record it observed
//! (value and version), and buffers writes until commit. Nothing a session
//! does is visible to anyone else until the arbitrator applies it.
//!
//! The first observation of a record fixes the version the session holds.
//! Loading the same key again returns the snapshot, not the store's newer
//! state, so a session never silently validates against a version it did
//! not base its writes on.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use strata_core::{
    RecordKey, RecordSlot, SessionId, StrataError, StrataResult, Value, Version, VersionedStore,
};

/// Session lifecycle
///
/// `Active` → `Committing` → `Committed` or `RolledBack`.
/// `Active` → `RolledBack` on explicit rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Session is open for loads and writes
    Active,
    /// Commit in progress
    Committing,
    /// All buffered writes were applied
    Committed,
    /// No buffered write was applied
    RolledBack {
        /// Human-readable reason
        reason: String,
    },
}

/// Buffered change to one record
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Store this value (insert or update)
    Put(Value),
    /// Tombstone the record
    Delete,
}

impl WriteOp {
    /// Value to write, `None` for a delete
    pub fn value(&self) -> Option<&Value> {
        match self {
            WriteOp::Put(v) => Some(v),
            WriteOp::Delete => None,
        }
    }

    /// Check if this is a delete
    pub fn is_delete(&self) -> bool {
        matches!(self, WriteOp::Delete)
    }
}

/// A buffered write and the version it was based on
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    /// What to apply
    pub op: WriteOp,
    /// Version the session observed; the store must still hold it at commit
    pub observed: Version,
    /// Whether the record held a live value when it was observed
    pub existed: bool,
}

/// Summary of buffered writes that a rollback would discard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperations {
    /// Buffered puts
    pub puts: usize,
    /// Buffered deletes
    pub deletes: usize,
}

impl PendingOperations {
    /// Total number of pending operations
    pub fn total(&self) -> usize {
        self.puts + self.deletes
    }

    /// Check if there are no pending operations
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// One unit of work against a `VersionedStore`
///
/// Sessions are created by `CommitArbitrator::begin` and committed through
/// `CommitArbitrator::try_commit`. A session is owned by one thread at a
/// time and is `Send`.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    /// Snapshot of every record this session loaded, first observation wins
    observed: HashMap<RecordKey, RecordSlot>,
    /// Buffered writes in key order
    writes: BTreeMap<RecordKey, PendingWrite>,
    status: SessionStatus,
    max_pending_writes: Option<usize>,
    start_time: Instant,
}

impl Session {
    /// Create an active session with no write limit
    pub fn new(id: SessionId) -> Self {
        Self::with_write_limit(id, None)
    }

    /// Create an active session that refuses more than `limit` buffered writes
    pub fn with_write_limit(id: SessionId, limit: Option<usize>) -> Self {
        Session {
            id,
            observed: HashMap::new(),
            writes: BTreeMap::new(),
            status: SessionStatus::Active,
            max_pending_writes: limit,
            start_time: Instant::now(),
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current lifecycle state
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Check if session can accept loads and writes
    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Active)
    }

    /// Check if session committed
    pub fn is_committed(&self) -> bool {
        matches!(self.status, SessionStatus::Committed)
    }

    /// Check if session rolled back
    pub fn is_rolled_back(&self) -> bool {
        matches!(self.status, SessionStatus::RolledBack { .. })
    }

    /// Reason for rollback, if rolled back
    pub fn rollback_reason(&self) -> Option<&str> {
        match &self.status {
            SessionStatus::RolledBack { reason } => Some(reason),
            _ => None,
        }
    }

    /// Time since the session began
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Check if the session has been open longer than `timeout`
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.start_time.elapsed() > timeout
    }

    /// Check if session can accept operations
    ///
    /// # Errors
    /// Returns `StrataError::SessionNotActive` if the session committed,
    /// rolled back, or is mid-commit.
    pub fn ensure_active(&self) -> StrataResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StrataError::SessionNotActive {
                session: self.id,
                state: format!("{:?}", self.status),
            })
        }
    }

    // ========================================================================
    // Loads
    // ========================================================================

    /// Load a record, recording the version observed
    ///
    /// Returns the value as this session sees it: its own buffered write if
    /// there is one, otherwise the snapshot taken on first load. Only the
    /// first load of a key reads the store.
    ///
    /// An absent record loads as `None`. Its observed version is the
    /// tombstone's version, or `Version::ZERO` if it was never written.
    pub fn load<S>(&mut self, store: &S, key: &RecordKey) -> StrataResult<Option<Value>>
    where
        S: VersionedStore + ?Sized,
    {
        self.ensure_active()?;

        if let Some(write) = self.writes.get(key) {
            return Ok(write.op.value().cloned());
        }

        if let Some(slot) = self.observed.get(key) {
            return Ok(slot.value.clone());
        }

        let slot = store.read(key)?;
        let value = slot.value.clone();
        self.observed.insert(key.clone(), slot);
        Ok(value)
    }

    /// Version this session holds for `key`, if it observed one
    ///
    /// For a merged write this is the version the caller supplied.
    pub fn observed_version(&self, key: &RecordKey) -> Option<Version> {
        self.writes
            .get(key)
            .map(|w| w.observed)
            .or_else(|| self.observed.get(key).map(|slot| slot.version))
    }

    /// Number of records loaded from the store
    pub fn loaded_count(&self) -> usize {
        self.observed.len()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Buffer a new value for a record this session loaded
    ///
    /// # Errors
    /// - `InvalidInput` if the record was never loaded by this session
    /// - `NotFound` if the record is absent (as loaded or after a buffered delete)
    /// - `SessionNotActive` if the session is not active
    pub fn update(&mut self, key: RecordKey, value: Value) -> StrataResult<()> {
        self.ensure_active()?;

        let (observed, existed) = match self.writes.get(&key) {
            Some(PendingWrite {
                op: WriteOp::Put(_),
                observed,
                existed,
            }) => (*observed, *existed),
            Some(PendingWrite {
                op: WriteOp::Delete,
                ..
            }) => return Err(StrataError::NotFound { key }),
            None => {
                let slot = self.loaded_slot(&key, "updated")?;
                if slot.value.is_none() {
                    return Err(StrataError::NotFound { key });
                }
                (slot.version, true)
            }
        };

        self.buffer(
            key,
            PendingWrite {
                op: WriteOp::Put(value),
                observed,
                existed,
            },
        )
    }

    /// Buffer creation of a record
    ///
    /// If the key was loaded, the write is based on the observed version
    /// (the tombstone's version after a delete). Otherwise it is based on
    /// `Version::ZERO` and only commits if the record was never written.
    ///
    /// # Errors
    /// - `InvalidInput` if the record exists in this session's view
    /// - `SessionNotActive` if the session is not active
    pub fn insert(&mut self, key: RecordKey, value: Value) -> StrataResult<()> {
        self.ensure_active()?;

        let (observed, existed) = match self.writes.get(&key) {
            Some(PendingWrite {
                op: WriteOp::Put(_),
                ..
            }) => {
                return Err(StrataError::invalid_input(format!(
                    "{} already exists in {}",
                    key, self.id
                )))
            }
            Some(PendingWrite {
                op: WriteOp::Delete,
                observed,
                existed,
            }) => (*observed, *existed),
            None => match self.observed.get(&key) {
                Some(slot) if slot.value.is_some() => {
                    return Err(StrataError::invalid_input(format!(
                        "{} already exists in {}",
                        key, self.id
                    )))
                }
                Some(slot) => (slot.version, false),
                None => (Version::ZERO, false),
            },
        };

        self.buffer(
            key,
            PendingWrite {
                op: WriteOp::Put(value),
                observed,
                existed,
            },
        )
    }

    /// Buffer a write based on a version the caller observed elsewhere
    ///
    /// Used for detached state: the caller loaded the record in an earlier
    /// session and carries its version across. The write commits only if
    /// the store still holds `observed`.
    ///
    /// # Errors
    /// - `SessionNotActive` if the session is not active
    pub fn merge(&mut self, key: RecordKey, observed: Version, value: Value) -> StrataResult<()> {
        self.ensure_active()?;
        self.buffer(
            key,
            PendingWrite {
                op: WriteOp::Put(value),
                observed,
                existed: !observed.is_zero(),
            },
        )
    }

    /// Buffer deletion of a record this session loaded
    ///
    /// Deleting a record this session inserted itself cancels the insert.
    ///
    /// # Errors
    /// - `InvalidInput` if the record was never loaded by this session
    /// - `NotFound` if the record is absent in this session's view
    /// - `SessionNotActive` if the session is not active
    pub fn delete(&mut self, key: RecordKey) -> StrataResult<()> {
        self.ensure_active()?;

        match self.writes.get(&key) {
            Some(PendingWrite {
                op: WriteOp::Delete,
                ..
            }) => Err(StrataError::NotFound { key }),
            Some(PendingWrite {
                op: WriteOp::Put(_),
                existed: false,
                ..
            }) => {
                self.writes.remove(&key);
                Ok(())
            }
            Some(PendingWrite {
                op: WriteOp::Put(_),
                observed,
                ..
            }) => {
                let observed = *observed;
                self.buffer(
                    key,
                    PendingWrite {
                        op: WriteOp::Delete,
                        observed,
                        existed: true,
                    },
                )
            }
            None => {
                let slot = self.loaded_slot(&key, "deleted")?;
                if slot.value.is_none() {
                    return Err(StrataError::NotFound { key });
                }
                let observed = slot.version;
                self.buffer(
                    key,
                    PendingWrite {
                        op: WriteOp::Delete,
                        observed,
                        existed: true,
                    },
                )
            }
        }
    }

    fn loaded_slot(&self, key: &RecordKey, action: &str) -> StrataResult<&RecordSlot> {
        self.observed.get(key).ok_or_else(|| {
            StrataError::invalid_input(format!(
                "{} must be loaded in {} before it is {}",
                key, self.id, action
            ))
        })
    }

    fn buffer(&mut self, key: RecordKey, write: PendingWrite) -> StrataResult<()> {
        if let Some(limit) = self.max_pending_writes {
            if self.writes.len() >= limit && !self.writes.contains_key(&key) {
                return Err(StrataError::invalid_input(format!(
                    "{} exceeds the limit of {} pending writes",
                    self.id, limit
                )));
            }
        }
        self.writes.insert(key, write);
        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Buffered writes in key order
    pub fn pending_writes(&self) -> impl Iterator<Item = (&RecordKey, &PendingWrite)> {
        self.writes.iter()
    }

    /// Buffered write for `key`, if any
    pub fn pending_write(&self, key: &RecordKey) -> Option<&PendingWrite> {
        self.writes.get(key)
    }

    /// Keys with buffered writes, sorted
    pub fn write_keys(&self) -> Vec<RecordKey> {
        self.writes.keys().cloned().collect()
    }

    /// Count of buffered puts and deletes
    pub fn pending_operations(&self) -> PendingOperations {
        let deletes = self.writes.values().filter(|w| w.op.is_delete()).count();
        PendingOperations {
            puts: self.writes.len() - deletes,
            deletes,
        }
    }

    /// Check if the session has nothing to write
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    // ========================================================================
    // State transitions (driven by the arbitrator)
    // ========================================================================

    /// `Active` → `Committing`
    pub(crate) fn mark_committing(&mut self) -> StrataResult<()> {
        self.ensure_active()?;
        self.status = SessionStatus::Committing;
        Ok(())
    }

    /// `Committing` → `Committed`
    pub(crate) fn mark_committed(&mut self) -> StrataResult<()> {
        match self.status {
            SessionStatus::Committing => {
                self.status = SessionStatus::Committed;
                Ok(())
            }
            _ => Err(StrataError::internal(format!(
                "Cannot mark {} committed from {:?}",
                self.id, self.status
            ))),
        }
    }

    /// `Active` or `Committing` → `RolledBack`, discarding buffered writes
    pub(crate) fn mark_rolled_back(&mut self, reason: String) -> StrataResult<()> {
        match self.status {
            SessionStatus::Active | SessionStatus::Committing => {
                self.abort_commit(reason);
                Ok(())
            }
            _ => Err(StrataError::SessionNotActive {
                session: self.id,
                state: format!("{:?}", self.status),
            }),
        }
    }

    /// `Committing` → `RolledBack`, discarding buffered writes
    ///
    /// Only the arbitrator calls this, while it owns the commit.
    pub(crate) fn abort_commit(&mut self, reason: String) {
        debug_assert!(
            matches!(self.status, SessionStatus::Active | SessionStatus::Committing),
            "abort_commit on finished session {}",
            self.id
        );
        self.status = SessionStatus::RolledBack { reason };
        self.writes.clear();
    }
}
