//! Per-record commit locks
//!
//! Commits serialize only on the records they write. Each key maps to its
//! own mutex, created on first use and dropped again once nobody holds or
//! waits on it. A commit takes all of its keys in sorted order, so two
//! commits with overlapping write sets cannot deadlock, and commits with
//! disjoint write sets never wait on each other.

use std::hash::BuildHasherDefault;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use rustc_hash::FxHasher;
use strata_core::RecordKey;

type KeyMutex = Arc<Mutex<()>>;

/// Table of per-record commit locks
#[derive(Debug, Default)]
pub struct KeyLockTable {
    locks: DashMap<RecordKey, KeyMutex, BuildHasherDefault<FxHasher>>,
}

impl KeyLockTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key, blocking until all are held
    ///
    /// Keys are sorted and deduplicated before locking. The locks are
    /// released when the returned guard drops.
    pub fn lock_all<'a, I>(&'a self, keys: I) -> KeyLockGuard<'a>
    where
        I: IntoIterator<Item = &'a RecordKey>,
    {
        let mut keys: Vec<&RecordKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut held = Vec::with_capacity(keys.len());
        for key in keys {
            let mutex = self.handle(key);
            held.push((key.clone(), mutex.lock_arc()));
        }
        KeyLockGuard { table: self, held }
    }

    fn handle(&self, key: &RecordKey) -> KeyMutex {
        // Clone the Arc out so the shard lock is released before blocking
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Number of keys with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check if no key is locked or awaited
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn release(&self, key: &RecordKey) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Holds a set of record locks until dropped
pub struct KeyLockGuard<'a> {
    table: &'a KeyLockTable,
    held: Vec<(RecordKey, ArcMutexGuard<RawMutex, ()>)>,
}

impl KeyLockGuard<'_> {
    /// Number of keys held
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Check if the guard holds nothing
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        while let Some((key, guard)) = self.held.pop() {
            drop(guard);
            self.table.release(&key);
        }
    }
}

impl std::fmt::Debug for KeyLockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyLockGuard")
            .field("keys", &self.held.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}
