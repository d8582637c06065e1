//! Concurrency layer for Strata OCC
//!
//! This crate implements optimistic concurrency control (OCC) with:
//! - Session: observed-version tracking and buffered writes
//! - Validation: every stale write found at commit time, not just the first
//! - CommitArbitrator: all-or-nothing commit under per-record locks
//! - ConflictReport: batched or per-record conflict reporting
//! - ArbitratorConfig: `strata-occ.toml` settings

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arbitrator;
pub mod config;
pub mod conflict;
pub mod lock_table;
pub mod session;
pub mod validation;

pub use arbitrator::{
    AppliedWrite, ArbitratorStats, CommitArbitrator, CommitError, CommitOutcome,
};
pub use config::{ArbitratorConfig, ConflictReporting, CONFIG_FILE_NAME};
pub use conflict::{ConflictReport, OptimisticLockError};
pub use lock_table::{KeyLockGuard, KeyLockTable};
pub use session::{PendingOperations, PendingWrite, Session, SessionStatus, WriteOp};
pub use validation::{validate_session, validate_write, RecordConflict, ValidationResult};
