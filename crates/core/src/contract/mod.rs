//! Contract types shared by every layer
//!
//! - `Version`: per-record optimistic concurrency counter
//! - `Versioned<T>`: value plus the version and time it was committed
//! - `Timestamp`: microseconds since Unix epoch

mod timestamp;
mod version;
mod versioned;

pub use timestamp::Timestamp;
pub use version::Version;
pub use versioned::{Versioned, VersionedValue};
