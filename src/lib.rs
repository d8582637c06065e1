//! Strata OCC - optimistic concurrency arbitration for in-memory records
//!
//! Sessions load records, remember the version they saw, and buffer writes.
//! At commit the arbitrator checks every written record against the shared
//! store. If any moved, the whole session rolls back with a conflict report;
//! otherwise every write lands and each record's version goes up by one.
//!
//! # Quick Start
//!
//! ```
//! use strata_occ::{Database, RecordKey, Value};
//!
//! let db = Database::ephemeral();
//! let key = RecordKey::new("Account", "1");
//! db.seed(key.clone(), Value::Int(100));
//!
//! // Two sessions load the same record
//! let mut a = db.begin_session();
//! let mut b = db.begin_session();
//! db.load(&mut a, &key)?;
//! db.load(&mut b, &key)?;
//! a.update(key.clone(), Value::Int(150))?;
//! b.update(key.clone(), Value::Int(80))?;
//!
//! // First committer wins, the second gets a conflict
//! db.commit(&mut a)?;
//! let err = db.commit(&mut b).unwrap_err();
//! assert!(err.is_conflict());
//! assert_eq!(db.get(&key)?, Some(Value::Int(150)));
//! # Ok::<(), strata_occ::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `strata-core`: keys, values, versions, the `VersionedStore` seam
//! - `strata-storage`: `ShardedStore`, the shared record table
//! - `strata-concurrency`: sessions, validation, `CommitArbitrator`
//!
//! This crate re-exports what callers need and adds the [`Database`] facade.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod database;
mod error;
mod retry;

pub use database::Database;
pub use error::{Error, Result};
pub use retry::RetryConfig;

pub use strata_concurrency::{
    AppliedWrite, ArbitratorConfig, ArbitratorStats, CommitArbitrator, CommitError,
    CommitOutcome, ConflictReport, ConflictReporting, OptimisticLockError, RecordConflict,
    Session, SessionStatus, CONFIG_FILE_NAME,
};
pub use strata_core::{RecordKey, SessionId, StrataError, Value, Version, VersionedStore};
pub use strata_storage::ShardedStore;
