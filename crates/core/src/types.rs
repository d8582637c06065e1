//! Record identity
//!
//! A `RecordKey` names one persisted aggregate: the entity it belongs to
//! and its identifier within that entity. Keys order by entity first, then
//! identifier, which gives commits a stable lock acquisition order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable identity of a versioned record
///
/// Cloning is cheap: both components are reference-counted.
///
/// # Examples
///
/// ```
/// use strata_core::RecordKey;
///
/// let key = RecordKey::new("Account", "42");
/// assert_eq!(key.entity(), "Account");
/// assert_eq!(key.id(), "42");
/// assert_eq!(key.to_string(), "Account#42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    entity: Arc<str>,
    id: Arc<str>,
}

impl RecordKey {
    /// Create a key from an entity name and an identifier
    pub fn new(entity: impl AsRef<str>, id: impl AsRef<str>) -> Self {
        RecordKey {
            entity: Arc::from(entity.as_ref()),
            id: Arc::from(id.as_ref()),
        }
    }

    /// Entity (record type) this key belongs to
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Identifier within the entity
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Check whether this key belongs to `entity`
    pub fn is_entity(&self, entity: &str) -> bool {
        &*self.entity == entity
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.id)
    }
}

/// Unique identifier of a session (unit of work)
///
/// Allocated monotonically by the arbitrator; never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw identifier
    pub const fn new(raw: u64) -> Self {
        SessionId(raw)
    }

    /// Raw numeric identifier
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}
