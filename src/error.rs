//! Public error type for the `strata-occ` facade
//!
//! Internal layers speak `StrataError` and `CommitError`. Both convert into
//! this flatter type so callers match on a handful of variants.

use strata_concurrency::CommitError;
use strata_core::{RecordKey, StrataError};
use thiserror::Error;

/// Result alias for facade operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Database`](crate::Database)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A commit was rolled back because records moved since they were loaded
    #[error("{message}")]
    Conflict {
        /// Every stale record
        keys: Vec<RecordKey>,
        /// Aggregated message
        message: String,
    },

    /// Bad argument or a session in the wrong state
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record does not exist
    #[error("Record not found: {0}")]
    NotFound(RecordKey),

    /// Store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Bad or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bug or broken invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if the operation failed on an optimistic lock conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Check if reloading and retrying the session can succeed
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }

    /// Stale records behind a conflict, empty for other errors
    pub fn conflicting_keys(&self) -> &[RecordKey] {
        match self {
            Error::Conflict { keys, .. } => keys,
            _ => &[],
        }
    }
}

impl From<StrataError> for Error {
    fn from(e: StrataError) -> Self {
        match e {
            StrataError::Conflict { keys, message } => Error::Conflict { keys, message },
            StrataError::VersionMismatch { ref key, .. } => Error::Conflict {
                keys: vec![key.clone()],
                message: e.to_string(),
            },
            StrataError::InvalidInput { message } => Error::InvalidInput(message),
            StrataError::SessionNotActive { .. } => Error::InvalidInput(e.to_string()),
            StrataError::NotFound { key } => Error::NotFound(key),
            StrataError::Storage { message } => Error::Storage(message),
            StrataError::Config { message } => Error::Config(message),
            StrataError::Internal { message } => Error::Internal(message),
        }
    }
}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        StrataError::from(e).into()
    }
}
