//! Commit Semantics Tests
//!
//! - First committer wins, the loser sees the record's key in its report
//! - A successful commit moves the record from v to v+1
//! - Nothing a rolled-back session wrote reaches the store

use crate::common::*;
use strata_occ::SessionStatus;

#[test]
fn first_committer_wins() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let key = account(0);

    let mut a = db.begin_session();
    let mut b = db.begin_session();
    db.load(&mut a, &key).unwrap();
    db.load(&mut b, &key).unwrap();
    a.update(key.clone(), Value::Int(150)).unwrap();
    b.update(key.clone(), Value::Int(80)).unwrap();

    let outcome = db.commit(&mut a).unwrap();
    assert_eq!(outcome.version_of(&key), Some(Version::new(2)));

    let err = db.commit(&mut b).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.conflicting_keys(), &[key.clone()]);
    assert_eq!(balance(&db, &key), 150);
}

#[test]
fn order_of_commit_decides_winner_not_order_of_load() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let key = account(0);

    let mut early = db.begin_session();
    db.load(&mut early, &key).unwrap();
    let mut late = db.begin_session();
    db.load(&mut late, &key).unwrap();

    late.update(key.clone(), Value::Int(2)).unwrap();
    early.update(key.clone(), Value::Int(1)).unwrap();

    db.commit(&mut late).unwrap();
    assert!(db.commit(&mut early).is_err());
    assert_eq!(balance(&db, &key), 2);
}

#[test]
fn each_commit_bumps_version_by_one() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let key = account(0);

    for expected in 2..=6u64 {
        db.session(|s, db| {
            let n = db.load(s, &key)?.and_then(|v| v.as_int()).unwrap_or(0);
            s.update(key.clone(), Value::Int(n + 1))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(db.version(&key).unwrap(), Version::new(expected));
    }
    assert_eq!(balance(&db, &key), 5);
}

#[test]
fn multi_record_commit_is_all_or_nothing() {
    let db = seeded_db(ArbitratorConfig::default(), 3);

    let mut s = db.begin_session();
    for i in 0..3 {
        db.load(&mut s, &account(i)).unwrap();
        s.update(account(i), Value::Int(10)).unwrap();
    }
    s.insert(account("new"), Value::Int(10)).unwrap();

    // Only the last record moves
    db.seed(account(2), Value::Int(7));

    assert!(db.commit(&mut s).is_err());
    assert_eq!(balance(&db, &account(0)), 0);
    assert_eq!(balance(&db, &account(1)), 0);
    assert_eq!(balance(&db, &account(2)), 7);
    assert_eq!(db.get(&account("new")).unwrap(), None);
    assert_eq!(db.version(&account(0)).unwrap(), Version::INITIAL);
}

#[test]
fn rolled_back_session_is_closed() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let mut s = stale_session(&db, &[account(0)]);

    assert!(db.commit(&mut s).is_err());
    assert!(matches!(s.status(), SessionStatus::RolledBack { .. }));

    let err = db.load(&mut s, &account(0)).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(s.insert(account("x"), Value::Null).is_err());
    assert!(db.commit(&mut s).is_err());
}

#[test]
fn read_only_session_commits_despite_concurrent_writes() {
    let db = seeded_db(ArbitratorConfig::default(), 2);

    let total = db
        .session(|s, db| {
            let a = db.load(s, &account(0))?.and_then(|v| v.as_int()).unwrap_or(0);
            db.seed(account(1), Value::Int(50));
            let b = db.load(s, &account(1))?.and_then(|v| v.as_int()).unwrap_or(0);
            Ok(a + b)
        })
        .unwrap();

    assert_eq!(total, 50);
}

#[test]
fn reload_keeps_first_observation() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let key = account(0);

    let mut s = db.begin_session();
    assert_eq!(db.load(&mut s, &key).unwrap(), Some(Value::Int(0)));
    db.seed(key.clone(), Value::Int(5));

    // Still the snapshot, and the write is still based on version 1
    assert_eq!(db.load(&mut s, &key).unwrap(), Some(Value::Int(0)));
    s.update(key.clone(), Value::Int(1)).unwrap();
    assert!(db.commit(&mut s).unwrap_err().is_conflict());
}

#[test]
fn delete_then_reinsert_keeps_counting() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let key = account(0);

    db.session(|s, db| {
        db.load(s, &key)?;
        s.delete(key.clone())?;
        Ok(())
    })
    .unwrap();
    assert_eq!(db.get(&key).unwrap(), None);
    assert_eq!(db.version(&key).unwrap(), Version::new(2));

    db.session(|s, db| {
        db.load(s, &key)?;
        s.insert(key.clone(), Value::Int(1))?;
        Ok(())
    })
    .unwrap();
    assert_eq!(db.version(&key).unwrap(), Version::new(3));
}

#[test]
fn blind_insert_over_tombstone_conflicts() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let key = account(0);

    db.session(|s, db| {
        db.load(s, &key)?;
        s.delete(key.clone())?;
        Ok(())
    })
    .unwrap();

    // An insert without a load assumes the record was never written
    let err = db
        .session(|s, _| {
            s.insert(key.clone(), Value::Int(1))?;
            Ok(())
        })
        .unwrap_err();
    assert!(err.is_conflict());
}
