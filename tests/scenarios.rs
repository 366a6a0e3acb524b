use std::env;
use std::fs;

use lstore_rs::{Database, Query, Transaction, TransactionWorker};

fn temp_db_path(tag: &str) -> String {
    let mut path = env::temp_dir();
    path.push(format!("lstore_rs_scenarios_{tag}_{}.json", std::process::id()));
    path.to_string_lossy().into_owned()
}

/// S1 — insert/select round trip.
#[test]
fn s1_insert_select_round_trip() {
    let mut db = Database::new();
    let table = db.create_table("T".to_string(), 3, 0).unwrap();
    let query = Query::new(table);

    assert!(query.insert(vec![1, 100, 200]));
    let got = query.select(1, 0, vec![1, 1, 1]);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].columns, vec![1, 100, 200]);
}

/// S2 — update and version walk.
#[test]
fn s2_update_and_version_walk() {
    let mut db = Database::new();
    let table = db.create_table("T".to_string(), 3, 0).unwrap();
    let query = Query::new(table);

    query.insert(vec![1, 100, 200]);
    assert!(query.update(1, vec![None, Some(999), Some(888)]));

    assert_eq!(query.select(1, 0, vec![1, 1, 1])[0].columns, vec![1, 999, 888]);
    assert_eq!(
        query.select_version(1, 0, vec![1, 1, 1], -1)[0].columns,
        vec![1, 100, 200]
    );
    assert_eq!(
        query.select_version(1, 0, vec![1, 1, 1], -5)[0].columns,
        vec![1, 100, 200]
    );
}

/// S3 — delete then aggregate.
#[test]
fn s3_delete_then_aggregate() {
    let mut db = Database::new();
    let table = db.create_table("T".to_string(), 5, 0).unwrap();
    let query = Query::new(table);

    for k in 10..20i64 {
        assert!(query.insert(vec![k, 93, 0, 0, 0]));
    }
    for k in (10..20i64).step_by(2) {
        assert!(query.delete(k));
    }

    pyo3::Python::with_gil(|py| {
        let total = query.sum(py, 10, 19, 1);
        let total: i64 = total.extract(py).unwrap();
        assert_eq!(total, 5 * 93);
    });
}

/// S4 — transaction abort restores state, even after a successful commit.
#[test]
fn s4_transaction_abort_restores_state() {
    let mut db = Database::new();
    let table = db.create_table("T".to_string(), 5, 0).unwrap();
    table.insert(vec![999, 10, 20, 30, 40]).unwrap();

    let mut tx = Transaction::new();
    tx.add_update(table.clone(), 999, vec![None, Some(99), Some(88), Some(77), Some(66)])
        .unwrap();

    assert!(tx.run());
    assert_eq!(
        table.select_latest(999, 0, &[true, true, true, true, true])[0].columns,
        vec![999, 99, 88, 77, 66]
    );

    assert!(tx.abort());
    assert_eq!(
        table.select_latest(999, 0, &[true, true, true, true, true])[0].columns,
        vec![999, 10, 20, 30, 40]
    );
}

/// S5 — transaction abort on mid-op failure: a guaranteed-failing duplicate
/// insert must unwind every balance update queued ahead of it.
#[test]
fn s5_transaction_abort_on_mid_op_failure() {
    let mut db = Database::new();
    let table = db.create_table("T".to_string(), 2, 0).unwrap();

    let keys: Vec<i64> = (0..10).collect();
    for &k in &keys {
        table.insert(vec![k, 100]).unwrap();
    }

    let mut tx = Transaction::new();
    for &k in &keys {
        tx.add_update(table.clone(), k, vec![None, Some(200)]).unwrap();
    }
    // Duplicate key guarantees a failure partway through the batch.
    tx.add_insert(table.clone(), vec![keys[0], 100]).unwrap();

    assert!(!tx.run());

    for &k in &keys {
        assert_eq!(
            table.select_latest(k, 0, &[true, true])[0].columns,
            vec![k, 100]
        );
    }
}

/// S6 — durability round trip through close/open.
#[test]
fn s6_durability_round_trip() {
    let path = temp_db_path("s6");

    {
        let mut db = Database::new();
        db.open(path.clone()).unwrap();
        let table = db.create_table("Grades".to_string(), 5, 0).unwrap();
        let query = Query::new(table);
        for k in 100_000_000..100_000_010i64 {
            assert!(query.insert(vec![k, k, k, k, k]));
        }
        db.close().unwrap();
    }

    {
        let mut db = Database::new();
        db.open(path.clone()).unwrap();
        let table = db.get_table("Grades".to_string()).unwrap();
        let got = table.select_latest(100_000_005, 0, &[true, true, true, true, true]);
        assert_eq!(got[0].columns, vec![100_000_005; 5]);
    }

    let _ = fs::remove_file(&path);
}

/// A TransactionWorker runs its queued transactions to completion and
/// reports how many committed.
#[test]
fn transaction_worker_runs_queue_sequentially() {
    let mut db = Database::new();
    let table = db.create_table("T".to_string(), 2, 0).unwrap();
    table.insert(vec![1, 10]).unwrap();

    pyo3::Python::with_gil(|py| {
        let mut worker = TransactionWorker::new();

        let mut ok_tx = Transaction::new();
        ok_tx.add_update(table.clone(), 1, vec![None, Some(20)]).unwrap();
        let ok_tx = pyo3::Py::new(py, ok_tx).unwrap();

        let mut bad_tx = Transaction::new();
        bad_tx.add_update(table.clone(), 404, vec![None, Some(1)]).unwrap();
        let bad_tx = pyo3::Py::new(py, bad_tx).unwrap();

        worker.add_transaction(ok_tx);
        worker.add_transaction(bad_tx);
        worker.run(py);

        assert_eq!(worker.join(), 1);
    });

    assert_eq!(
        table.select_latest(1, 0, &[true, true])[0].columns,
        vec![1, 20]
    );
}

/// A database reconfigured with a tiny page geometry rolls over base pages
/// and ranges far sooner, but stays correct.
#[test]
fn configured_page_geometry_rolls_over_correctly() {
    let mut db = Database::new();
    db.configure(4, 2); // 4 cells/page, 2 base pages/range -> 8 rows/range
    let table = db.create_table("Tiny".to_string(), 2, 0).unwrap();
    let query = Query::new(table.clone());

    for k in 0..25i64 {
        assert!(query.insert(vec![k, k * 10]));
    }
    for k in 0..25i64 {
        assert_eq!(
            table.select_latest(k, 0, &[true, true])[0].columns,
            vec![k, k * 10]
        );
    }

    pyo3::Python::with_gil(|py| {
        let total = query.sum(py, 0, 24, 1);
        let total: i64 = total.extract(py).unwrap();
        assert_eq!(total, (0..25i64).map(|k| k * 10).sum::<i64>());
    });
}

/// A secondary index, once built, lets select/select_version resolve on a
/// non-key column.
#[test]
fn secondary_index_resolves_non_key_selects() {
    let mut db = Database::new();
    let table = db.create_table("T".to_string(), 3, 0).unwrap();
    let query = Query::new(table);

    query.insert(vec![1, 55, 0]);
    query.insert(vec![2, 55, 0]);
    query.insert(vec![3, 77, 0]);

    assert!(query.select(55, 1, vec![1, 1, 1]).is_empty());
    assert!(query.build_index(1));

    let mut got = query.select(55, 1, vec![1, 1, 1]);
    got.sort_by_key(|r| r.key);
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].columns, vec![1, 55, 0]);
    assert_eq!(got[1].columns, vec![2, 55, 0]);
}
