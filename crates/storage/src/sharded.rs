//! Sharded record table
//!
//! DashMap keyed by record identity, version stored alongside the value.
//!
//! # Design
//!
//! - DashMap: 16-way sharded by default, readers never block each other
//! - FxHash: fast non-crypto hash for record keys
//! - Per-key atomicity: every conditional write runs inside the DashMap
//!   entry guard, so the version comparison and the increment happen under
//!   the same shard lock
//!
//! # Version Handling
//!
//! Versions are per record, not global. A committed write moves a record
//! from `v` to `v + 1`. Deletes leave a tombstone carrying their version.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, Ordering};
use strata_core::{
    empty_slot, RecordKey, RecordSlot, StrataResult, Value, Version, VersionedStore,
    WriteOutcome,
};
use tracing::trace;

use crate::stored_value::StoredRecord;

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Sharded in-memory record table
///
/// # Thread Safety
///
/// All operations are thread-safe:
/// - `read()`: shared shard guard, never blocks other readers
/// - `compare_and_write()`: exclusive guard on the key's shard only
/// - Keys in different shards never contend
///
/// # Example
///
/// ```
/// use strata_core::{RecordKey, Value, Version, VersionedStore};
/// use strata_storage::ShardedStore;
///
/// let store = ShardedStore::new();
/// let key = RecordKey::new("Account", "1");
/// store.put(key.clone(), Value::Int(100));
///
/// let current = store.get(&key).unwrap().unwrap();
/// assert_eq!(current.version, Version::INITIAL);
/// ```
pub struct ShardedStore {
    records: DashMap<RecordKey, StoredRecord, FxBuildHasher>,
    /// Total writes applied (puts, deletes and conditional writes)
    writes_applied: AtomicU64,
}

impl ShardedStore {
    /// Create new sharded store
    pub fn new() -> Self {
        Self {
            records: DashMap::with_hasher(FxBuildHasher::default()),
            writes_applied: AtomicU64::new(0),
        }
    }

    /// Create with expected number of records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: DashMap::with_capacity_and_hasher(capacity, FxBuildHasher::default()),
            writes_applied: AtomicU64::new(0),
        }
    }

    /// Unconditionally write a value, bumping the record's version by one
    ///
    /// Intended for seeding fixtures and administrative loads. Concurrent
    /// sessions that observed the previous version will conflict on commit.
    pub fn put(&self, key: RecordKey, value: Value) -> Version {
        self.write_unconditionally(key, Some(value))
    }

    /// Unconditionally delete a record, leaving a tombstone
    ///
    /// Returns the tombstone's version, or `None` if the record was absent.
    pub fn delete(&self, key: &RecordKey) -> Option<Version> {
        let mut entry = self.records.get_mut(key)?;
        if entry.is_tombstone() {
            return None;
        }
        let version = entry.version().next();
        *entry = StoredRecord::tombstone(version);
        self.writes_applied.fetch_add(1, Ordering::Relaxed);
        Some(version)
    }

    fn write_unconditionally(&self, key: RecordKey, value: Option<Value>) -> Version {
        let version = match self.records.entry(key) {
            Entry::Occupied(mut occ) => {
                let version = occ.get().version().next();
                occ.insert(StoredRecord::new(value, version));
                version
            }
            Entry::Vacant(vac) => {
                vac.insert(StoredRecord::new(value, Version::INITIAL));
                Version::INITIAL
            }
        };
        self.writes_applied.fetch_add(1, Ordering::Relaxed);
        version
    }

    /// Check if a live record exists
    #[inline]
    pub fn contains(&self, key: &RecordKey) -> bool {
        self.records
            .get(key)
            .map(|rec| !rec.is_tombstone())
            .unwrap_or(false)
    }

    /// Live record keys, sorted
    pub fn keys(&self) -> Vec<RecordKey> {
        let mut keys: Vec<RecordKey> = self
            .records
            .iter()
            .filter(|entry| !entry.value().is_tombstone())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Live record keys of one entity, sorted
    pub fn keys_for_entity(&self, entity: &str) -> Vec<RecordKey> {
        let mut keys: Vec<RecordKey> = self
            .records
            .iter()
            .filter(|entry| entry.key().is_entity(entity) && !entry.value().is_tombstone())
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of slots held, tombstones included
    pub fn slot_count(&self) -> usize {
        self.records.len()
    }

    /// Number of tombstones held
    pub fn tombstone_count(&self) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.value().is_tombstone())
            .count()
    }

    /// Check if the store holds no live records
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Total writes applied since creation
    pub fn writes_applied(&self) -> u64 {
        self.writes_applied.load(Ordering::Relaxed)
    }

    /// Drop every slot, tombstones included
    pub fn clear(&self) {
        self.records.clear();
    }
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionedStore for ShardedStore {
    fn read(&self, key: &RecordKey) -> StrataResult<RecordSlot> {
        Ok(self
            .records
            .get(key)
            .map(|rec| rec.to_slot())
            .unwrap_or_else(empty_slot))
    }

    fn compare_and_write(
        &self,
        key: &RecordKey,
        expected: Version,
        value: Option<Value>,
    ) -> StrataResult<WriteOutcome> {
        let outcome = match self.records.entry(key.clone()) {
            Entry::Occupied(mut occ) => {
                let current = occ.get().version();
                if current != expected {
                    return Ok(WriteOutcome::VersionMismatch { current });
                }
                let version = current.next();
                occ.insert(StoredRecord::new(value, version));
                WriteOutcome::Applied { version }
            }
            Entry::Vacant(vac) => {
                if !expected.is_zero() {
                    return Ok(WriteOutcome::VersionMismatch {
                        current: Version::ZERO,
                    });
                }
                vac.insert(StoredRecord::new(value, Version::INITIAL));
                WriteOutcome::Applied {
                    version: Version::INITIAL,
                }
            }
        };
        self.writes_applied.fetch_add(1, Ordering::Relaxed);
        Ok(outcome)
    }

    fn revert(
        &self,
        key: &RecordKey,
        applied: Version,
        prior: Option<Value>,
    ) -> StrataResult<Option<Version>> {
        let outcome = self.compare_and_write(key, applied, prior)?;
        match outcome {
            WriteOutcome::Applied { version } => {
                trace!(
                    target: "strata::storage",
                    key = %key,
                    applied = %applied,
                    version = %version,
                    "Reverted write"
                );
                Ok(Some(version))
            }
            WriteOutcome::VersionMismatch { .. } => Ok(None),
        }
    }

    fn record_count(&self) -> usize {
        self.records
            .iter()
            .filter(|entry| !entry.value().is_tombstone())
            .count()
    }

    fn current_version(&self, key: &RecordKey) -> StrataResult<Version> {
        Ok(self
            .records
            .get(key)
            .map(|rec| rec.version())
            .unwrap_or(Version::ZERO))
    }
}
