//! Shared test utilities for the integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

pub use strata_occ::{
    ArbitratorConfig, Database, Error, RecordKey, RetryConfig, Session, Value, Version,
};

// ============================================================================
// Keys and fixtures
// ============================================================================

pub fn account(id: impl std::fmt::Display) -> RecordKey {
    RecordKey::new("Account", id.to_string())
}

/// Database with `count` accounts seeded at balance 0 (version 1)
pub fn seeded_db(config: ArbitratorConfig, count: usize) -> Arc<Database> {
    let db = Database::with_config(config).unwrap();
    for i in 0..count {
        db.seed(account(i), Value::Int(0));
    }
    Arc::new(db)
}

/// Seed a record from a JSON document
pub fn seed_json(db: &Database, key: &RecordKey, doc: serde_json::Value) -> Version {
    db.seed(key.clone(), Value::from(doc))
}

pub fn balance(db: &Database, key: &RecordKey) -> i64 {
    db.get(key)
        .unwrap()
        .and_then(|v| v.as_int())
        .expect("balance present")
}

/// Session that loaded every key and rewrote it, after which every key was
/// bumped by an outside writer
pub fn stale_session(db: &Database, keys: &[RecordKey]) -> Session {
    let mut s = db.begin_session();
    for k in keys {
        db.load(&mut s, k).unwrap();
        s.update(k.clone(), Value::Int(-1)).unwrap();
    }
    for k in keys {
        db.seed(k.clone(), Value::Int(99));
    }
    s
}

// ============================================================================
// Threads
// ============================================================================

/// Run `f(i)` on `n` threads released together, collecting results in order
pub fn race<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize, &Barrier) -> T + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(n));
    let f = Arc::new(f);
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let f = Arc::clone(&f);
            thread::spawn(move || f(i, &barrier))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

// ============================================================================
// Log capture
// ============================================================================

struct WarnCounter(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Run `f` with a subscriber installed on this thread, returning its result
/// and the number of WARN events it emitted
pub fn with_warn_count<T>(f: impl FnOnce() -> T) -> (T, usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&count)));
    let out = tracing::subscriber::with_default(subscriber, f);
    (out, count.load(Ordering::SeqCst))
}
