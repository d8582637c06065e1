//! Contention Tests
//!
//! Real threads racing through the facade.

use crate::common::*;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;

#[test]
fn racing_sessions_exactly_one_wins() {
    const THREADS: usize = 10;
    let db = seeded_db(ArbitratorConfig::default(), 1);

    let results = {
        let db = Arc::clone(&db);
        race(THREADS, move |i, barrier| {
            let mut s = db.begin_session();
            db.load(&mut s, &account(0)).unwrap();
            s.update(account(0), Value::Int(i as i64 + 1)).unwrap();
            barrier.wait();
            db.commit(&mut s)
        })
    };

    let (wins, losses): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
    assert_eq!(wins.len(), 1);
    assert_eq!(losses.len(), THREADS - 1);
    for loss in losses {
        let err = loss.unwrap_err();
        assert_eq!(err.conflicting_keys(), &[account(0)]);
    }
    assert_eq!(db.version(&account(0)).unwrap(), Version::new(2));
}

#[test]
fn disjoint_sessions_never_interact() {
    const THREADS: usize = 8;
    let db = seeded_db(ArbitratorConfig::default(), THREADS);

    let results = {
        let db = Arc::clone(&db);
        race(THREADS, move |i, barrier| {
            let mut s = db.begin_session();
            db.load(&mut s, &account(i)).unwrap();
            s.update(account(i), Value::Int(1)).unwrap();
            barrier.wait();
            db.commit(&mut s)
        })
    };

    assert!(results.iter().all(|r| r.is_ok()));
    for i in 0..THREADS {
        assert_eq!(balance(&db, &account(i)), 1);
        assert_eq!(db.version(&account(i)).unwrap(), Version::new(2));
    }
    assert_eq!(db.stats().rolled_back, 0);
}

#[test]
fn increment_storm_with_retry_loses_no_updates() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 50;
    let db = seeded_db(ArbitratorConfig::default(), 1);

    let retry = RetryConfig::new()
        .with_max_retries(10_000)
        .with_base_delay_ms(0)
        .with_max_delay_ms(1);

    {
        let db = Arc::clone(&db);
        race(THREADS, move |_, barrier| {
            barrier.wait();
            for _ in 0..PER_THREAD {
                db.session_with_retry(retry.clone(), |s, db| {
                    let n = db.load(s, &account(0))?.and_then(|v| v.as_int()).unwrap_or(0);
                    s.update(account(0), Value::Int(n + 1))?;
                    Ok(())
                })
                .unwrap();
            }
        });
    }

    let total = (THREADS * PER_THREAD) as i64;
    assert_eq!(balance(&db, &account(0)), total);
    assert_eq!(db.version(&account(0)).unwrap(), Version::new(1 + total as u64));
}

#[test]
fn random_transfers_conserve_total() {
    const THREADS: usize = 6;
    const ACCOUNTS: usize = 5;
    const TRANSFERS: usize = 200;
    let db = seeded_db(ArbitratorConfig::default(), 0);
    for i in 0..ACCOUNTS {
        db.seed(account(i), Value::Int(1_000));
    }

    let committed = Arc::new(Mutex::new(0usize));
    {
        let db = Arc::clone(&db);
        let committed = Arc::clone(&committed);
        race(THREADS, move |_, barrier| {
            let mut rng = rand::thread_rng();
            barrier.wait();
            for _ in 0..TRANSFERS {
                let from = rng.gen_range(0..ACCOUNTS);
                let to = (from + rng.gen_range(1..ACCOUNTS)) % ACCOUNTS;
                let amount = rng.gen_range(1..=50i64);

                let result = db.session(|s, db| {
                    let a = db.load(s, &account(from))?.and_then(|v| v.as_int()).unwrap_or(0);
                    let b = db.load(s, &account(to))?.and_then(|v| v.as_int()).unwrap_or(0);
                    s.update(account(from), Value::Int(a - amount))?;
                    s.update(account(to), Value::Int(b + amount))?;
                    Ok(())
                });
                match result {
                    Ok(()) => *committed.lock() += 1,
                    Err(e) => assert!(e.is_conflict(), "unexpected error: {e}"),
                }
            }
        });
    }

    let total: i64 = (0..ACCOUNTS).map(|i| balance(&db, &account(i))).sum();
    assert_eq!(total, 1_000 * ACCOUNTS as i64);

    let stats = db.stats();
    assert_eq!(stats.committed as usize, *committed.lock());
    assert_eq!(stats.started, stats.committed + stats.rolled_back);
    assert_eq!(stats.active, 0);
}
