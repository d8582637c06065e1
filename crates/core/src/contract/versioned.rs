//! Generic versioned wrapper type
//!
//! Every read returns data wrapped in `Versioned<T>`:
//!
//! ```text
//! fn get(&self, key) -> Result<Option<Versioned<Value>>>
//! ```
//!
//! The version travels with the value so a session can remember what it
//! observed and present it again at commit time.

use super::{Timestamp, Version};
use serde::{Deserialize, Serialize};

/// A value with its version information
///
/// ## Invariants
///
/// - `version` always matches the committed write that produced this data
/// - `timestamp` is the commit time of this version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The actual value
    pub value: T,

    /// Version identifier
    pub version: Version,

    /// Creation timestamp (microseconds since epoch)
    pub timestamp: Timestamp,
}

impl<T> Versioned<T> {
    /// Create a new versioned value with current timestamp
    pub fn new(value: T, version: Version) -> Self {
        Versioned {
            value,
            version,
            timestamp: Timestamp::now(),
        }
    }

    /// Create a versioned value with explicit timestamp
    pub fn with_timestamp(value: T, version: Version, timestamp: Timestamp) -> Self {
        Versioned {
            value,
            version,
            timestamp,
        }
    }

    /// Map the inner value to a new type
    pub fn map<U, F>(self, f: F) -> Versioned<U>
    where
        F: FnOnce(T) -> U,
    {
        Versioned {
            value: f(self.value),
            version: self.version,
            timestamp: self.timestamp,
        }
    }

    /// Get a reference to the inner value
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consume and return the inner value
    #[inline]
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get the version
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }
}

/// Versioned record payload
pub type VersionedValue = Versioned<crate::value::Value>;
