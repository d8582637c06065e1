//! Conflict Reporting Tests
//!
//! Batched mode folds N stale rows into one failure and one warning.
//! Per-record mode reports and logs each row.

use crate::common::*;
use strata_occ::{CommitError, ConflictReporting, OptimisticLockError};

fn keys(n: usize) -> Vec<RecordKey> {
    (0..n).map(account).collect()
}

#[test]
fn batched_mode_yields_one_suppressing_error() {
    let db = seeded_db(ArbitratorConfig::batched(), 5);
    let mut s = stale_session(&db, &keys(5));

    let (result, warnings) = with_warn_count(|| db.arbitrator().try_commit(&mut s));

    assert_eq!(warnings, 1);
    let err = result.unwrap_err();
    let report = err.conflict_report().unwrap();
    assert_eq!(report.reporting(), ConflictReporting::Batched);
    assert_eq!(report.len(), 5);

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].to_string().starts_with("Suppressing 5"));
    assert_eq!(failures[0].keys(), keys(5));
}

#[test]
fn per_record_mode_yields_one_error_per_row() {
    let db = seeded_db(ArbitratorConfig::per_record(), 4);
    let mut s = stale_session(&db, &keys(4));

    let (result, warnings) = with_warn_count(|| db.arbitrator().try_commit(&mut s));

    assert_eq!(warnings, 4);
    let failures = result.unwrap_err().conflict_report().unwrap().failures();
    assert_eq!(failures.len(), 4);
    for (failure, key) in failures.iter().zip(keys(4)) {
        match failure {
            OptimisticLockError::Record {
                key: k,
                observed,
                current,
            } => {
                assert_eq!(k, &key);
                assert_eq!(*observed, Version::INITIAL);
                assert_eq!(*current, Version::new(2));
            }
            other => panic!("expected record failure, got {other:?}"),
        }
    }
}

#[test]
fn report_lists_only_stale_rows() {
    let db = seeded_db(ArbitratorConfig::batched(), 4);

    let mut s = db.begin_session();
    for k in keys(4) {
        db.load(&mut s, &k).unwrap();
        s.update(k, Value::Int(1)).unwrap();
    }
    db.seed(account(1), Value::Int(5));
    db.seed(account(3), Value::Int(5));

    let err = db.arbitrator().try_commit(&mut s).unwrap_err();
    let report = err.conflict_report().unwrap();
    assert_eq!(report.keys(), vec![account(1), account(3)]);
    assert_eq!(report.session_id(), s.id());
}

#[test]
fn facade_error_carries_aggregated_message() {
    let db = seeded_db(ArbitratorConfig::batched(), 2);
    let mut s = stale_session(&db, &keys(2));

    match db.commit(&mut s).unwrap_err() {
        Error::Conflict { keys: stale, message } => {
            assert_eq!(stale, keys(2));
            assert!(message.starts_with("Suppressing 2"));
            assert!(message.contains("Account#0"));
            assert!(message.contains("Account#1"));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn successful_commit_logs_no_warning() {
    let db = seeded_db(ArbitratorConfig::batched(), 1);
    let (result, warnings) = with_warn_count(|| {
        db.session(|s, db| {
            db.load(s, &account(0))?;
            s.update(account(0), Value::Int(1))?;
            Ok(())
        })
    });
    assert!(result.is_ok());
    assert_eq!(warnings, 0);
}

#[test]
fn invalid_state_is_not_a_conflict() {
    let db = seeded_db(ArbitratorConfig::batched(), 0);
    let mut s = db.begin_session();
    db.commit(&mut s).unwrap();

    let err = db.arbitrator().try_commit(&mut s).unwrap_err();
    assert!(matches!(err, CommitError::InvalidState(_)));
    assert!(!err.is_conflict());
}
