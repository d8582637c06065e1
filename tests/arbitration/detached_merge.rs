//! Detached Merge Tests
//!
//! A caller loads a record in one session, keeps the value and version,
//! and writes it back later from another session.

use crate::common::*;
use serde_json::json;

fn detach(db: &Database, key: &RecordKey) -> (Value, Version) {
    let mut s = db.begin_session();
    let value = db.load(&mut s, key).unwrap().unwrap();
    let version = s.observed_version(key).unwrap();
    db.commit(&mut s).unwrap();
    (value, version)
}

#[test]
fn merge_of_current_copy_commits() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let (value, version) = detach(&db, &account(0));
    assert_eq!(value, Value::Int(0));

    db.session(|s, _| {
        s.merge(account(0), version, Value::Int(42))?;
        Ok(())
    })
    .unwrap();

    assert_eq!(balance(&db, &account(0)), 42);
    assert_eq!(db.version(&account(0)).unwrap(), version.next());
}

#[test]
fn merge_of_stale_copy_conflicts() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let (_, version) = detach(&db, &account(0));

    db.seed(account(0), Value::Int(7));

    let err = db
        .session(|s, _| {
            s.merge(account(0), version, Value::Int(42))?;
            Ok(())
        })
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(balance(&db, &account(0)), 7);
}

#[test]
fn merge_of_deleted_record_conflicts() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let (_, version) = detach(&db, &account(0));

    db.session(|s, db| {
        db.load(s, &account(0))?;
        s.delete(account(0))?;
        Ok(())
    })
    .unwrap();

    let err = db
        .session(|s, _| {
            s.merge(account(0), version, Value::Int(1))?;
            Ok(())
        })
        .unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(db.get(&account(0)).unwrap(), None);
}

#[test]
fn two_detached_copies_race() {
    let db = seeded_db(ArbitratorConfig::default(), 1);
    let (_, v1) = detach(&db, &account(0));
    let (_, v2) = detach(&db, &account(0));
    assert_eq!(v1, v2);

    let mut a = db.begin_session();
    let mut b = db.begin_session();
    a.merge(account(0), v1, Value::Int(1)).unwrap();
    b.merge(account(0), v2, Value::Int(2)).unwrap();

    db.commit(&mut b).unwrap();
    assert!(db.commit(&mut a).unwrap_err().is_conflict());
    assert_eq!(balance(&db, &account(0)), 2);
}

#[test]
fn merge_of_edited_document_keeps_other_fields() {
    let db = Database::ephemeral();
    let order = RecordKey::new("Order", "o-1");
    seed_json(&db, &order, json!({"status": "open", "total": 120}));

    let (mut doc, version) = detach(&db, &order);
    if let Value::Object(fields) = &mut doc {
        fields.insert("status".into(), Value::from("shipped"));
    }

    db.session(|s, _| {
        s.merge(order.clone(), version, doc.clone())?;
        Ok(())
    })
    .unwrap();

    let stored = db.get(&order).unwrap().unwrap();
    assert_eq!(stored.field("status"), Some(&Value::from("shipped")));
    assert_eq!(stored.field("total"), Some(&Value::Int(120)));
    assert_eq!(db.version(&order).unwrap(), Version::new(2));
}
