use serde_json::json;
use std::sync::Arc;
use tally_database::*;
use tally_domain::error::{Classify, ErrorKind};
use tokio::sync::Barrier;

fn seeded() -> Database {
    let db = Database::builder().init().expect("init store");
    let mut tx = db.begin("seed");
    tx.insert("example", "example:1", json!({ "name": "seed" })).expect("insert");
    tx.commit().expect("commit seed");
    db
}

#[tokio::test]
async fn zero_capacity_fails_validation() {
    let err = Database::builder().outbox_capacity(0).init().unwrap_err();
    assert!(matches!(err, DatabaseError::Validation { .. }));
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_at_the_same_version_have_one_winner() {
    let db = seeded();
    let writers = 8;
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = (0..writers)
        .map(|n| {
            let db = db.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                let mut tx = db.begin(format!("writer-{n}"));
                tx.update_if_version("example", "example:1", 1, json!({ "name": n }))?;
                tokio::task::yield_now().await;
                tx.commit()
            })
        })
        .collect();

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(()) => wins += 1,
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::Conflict, "unexpected error: {err}");
                conflicts += 1;
            },
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(conflicts, writers - 1);
    assert_eq!(db.get("example", "example:1").map(|row| row.version), Some(2));
    assert_eq!(db.stats().open(), 0);
}

#[tokio::test]
async fn missing_rows_classify_as_not_found() {
    let db = seeded();
    let mut tx = db.begin("tx");
    let err = tx.update_if_version("example", "example:404", 1, json!({})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = tx.insert("example", "example:1", json!({})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn stats_track_every_lifecycle() {
    let db = Database::builder().init().expect("init store");

    let mut committed = db.begin("a");
    committed.commit().expect("commit");

    let mut rolled_back = db.begin("b");
    assert!(rolled_back.rollback());

    let open = db.begin("c");
    assert_eq!(db.stats(), DatabaseStats { begun: 3, committed: 1, rolled_back: 1 });
    assert_eq!(db.stats().open(), 1);

    drop(open);
    assert_eq!(db.stats().open(), 0);
}
