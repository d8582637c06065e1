//! Storage layer for Strata OCC
//!
//! This crate implements the shared record table:
//! - ShardedStore: DashMap-backed map from record key to versioned slot
//! - StoredRecord: slot wrapper that keeps tombstones versioned
//!
//! The table is the only state shared between sessions. All mutation goes
//! through per-key atomic conditional writes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sharded;
pub mod stored_value;

pub use sharded::ShardedStore;
pub use stored_value::StoredRecord;
