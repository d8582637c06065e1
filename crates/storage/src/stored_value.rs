//! Storage-layer record wrapper with tombstone support
//!
//! The contract type `Versioned<T>` knows nothing about deletes. A deleted
//! record still has to remember its version, otherwise a re-insert would
//! restart at 1 and a session holding the pre-delete version could commit
//! against an unrelated record. `StoredRecord` keeps the slot, tombstone
//! or not.

use strata_core::{RecordSlot, Timestamp, Value, Version, Versioned};

/// One record slot as held by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    slot: RecordSlot,
}

impl StoredRecord {
    /// Live record holding `value` at `version`
    pub fn live(value: Value, version: Version) -> Self {
        StoredRecord {
            slot: Versioned::new(Some(value), version),
        }
    }

    /// Tombstone left by a delete committed at `version`
    pub fn tombstone(version: Version) -> Self {
        StoredRecord {
            slot: Versioned::new(None, version),
        }
    }

    /// Live record or tombstone depending on `value`
    pub fn new(value: Option<Value>, version: Version) -> Self {
        StoredRecord {
            slot: Versioned::new(value, version),
        }
    }

    /// Current version of the slot
    #[inline]
    pub fn version(&self) -> Version {
        self.slot.version
    }

    /// Commit time of the current version
    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.slot.timestamp
    }

    /// Value, or `None` for a tombstone
    #[inline]
    pub fn value(&self) -> Option<&Value> {
        self.slot.value.as_ref()
    }

    /// Check if this slot is a tombstone
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.slot.value.is_none()
    }

    /// Copy out the slot for a caller
    pub fn to_slot(&self) -> RecordSlot {
        self.slot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_record() {
        let rec = StoredRecord::live(Value::Int(5), Version::new(3));
        assert!(!rec.is_tombstone());
        assert_eq!(rec.value(), Some(&Value::Int(5)));
        assert_eq!(rec.version(), Version::new(3));
    }

    #[test]
    fn test_tombstone_keeps_version() {
        let rec = StoredRecord::tombstone(Version::new(8));
        assert!(rec.is_tombstone());
        assert_eq!(rec.value(), None);
        assert_eq!(rec.version(), Version::new(8));
    }

    #[test]
    fn test_new_stamps_commit_time() {
        let rec = StoredRecord::new(Some(Value::Bool(true)), Version::new(2));
        assert!(rec.timestamp().is_after(Timestamp::EPOCH));
        assert_eq!(rec.to_slot().timestamp, rec.timestamp());
    }
}
