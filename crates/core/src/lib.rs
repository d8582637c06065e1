//! Core types and traits for Strata OCC
//!
//! This crate defines the foundational types used throughout the system:
//! - RecordKey: Stable identity of a versioned record
//! - SessionId: Identity of a unit of work
//! - Value: Unified value enum for record payloads
//! - Version / Versioned<T> / Timestamp: version contract types
//! - StrataError: Error type hierarchy
//! - VersionedStore: atomic versioned read + conditional write seam

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod error;
pub mod traits;
pub mod types;
pub mod value;

pub use contract::{Timestamp, Version, Versioned, VersionedValue};
pub use error::{StrataError, StrataResult};
pub use traits::{empty_slot, RecordSlot, VersionedStore, WriteOutcome};
pub use types::{RecordKey, SessionId};
pub use value::Value;
