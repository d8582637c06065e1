//! Error types for Strata OCC
//!
//! This module defines the error type shared by the storage and
//! concurrency layers. We use `thiserror` for automatic `Display` and
//! `Error` trait implementations.

use crate::contract::Version;
use crate::types::{RecordKey, SessionId};
use thiserror::Error;

/// Result type alias for Strata operations
pub type StrataResult<T> = std::result::Result<T, StrataError>;

/// Error types for the storage and concurrency layers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrataError {
    /// Caller passed an argument that cannot be honored
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong
        message: String,
    },

    /// Record does not exist (or is a tombstone)
    #[error("Record not found: {key}")]
    NotFound {
        /// Missing record
        key: RecordKey,
    },

    /// Operation on a session that already committed or rolled back
    #[error("{session} is not active: {state}")]
    SessionNotActive {
        /// Session the operation targeted
        session: SessionId,
        /// Current state, for diagnostics
        state: String,
    },

    /// Single-record version mismatch
    #[error("Version mismatch on {key}: expected {expected}, found {actual}")]
    VersionMismatch {
        /// Record that moved
        key: RecordKey,
        /// Version the caller expected
        expected: Version,
        /// Version found in the store
        actual: Version,
    },

    /// Commit rolled back because one or more records had moved
    #[error("Optimistic lock conflict on {} record(s): {message}", keys.len())]
    Conflict {
        /// Every record that conflicted
        keys: Vec<RecordKey>,
        /// Aggregated human-readable message
        message: String,
    },

    /// Storage layer failure
    #[error("Storage error: {message}")]
    Storage {
        /// Failure details
        message: String,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Failure details
        message: String,
    },

    /// Invariant violation inside the library
    #[error("Internal error: {message}")]
    Internal {
        /// Failure details
        message: String,
    },
}

impl StrataError {
    /// Build an `InvalidInput` error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StrataError::InvalidInput {
            message: message.into(),
        }
    }

    /// Build a `Storage` error
    pub fn storage(message: impl Into<String>) -> Self {
        StrataError::Storage {
            message: message.into(),
        }
    }

    /// Build a `Config` error
    pub fn config(message: impl Into<String>) -> Self {
        StrataError::Config {
            message: message.into(),
        }
    }

    /// Build an `Internal` error
    pub fn internal(message: impl Into<String>) -> Self {
        StrataError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is an optimistic concurrency conflict
    ///
    /// Conflicts may succeed if the caller reloads and retries.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StrataError::Conflict { .. } | StrataError::VersionMismatch { .. }
        )
    }
}
