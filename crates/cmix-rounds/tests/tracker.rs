//! End-to-end tracker tests against on-disk SQLite.

use std::sync::Arc;

use cmix_rounds::store::{MemoryStore, SqliteStore};
use cmix_rounds::{RoundId, RoundTracker, TrackerConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn config(capacity: usize) -> TrackerConfig {
    TrackerConfig {
        capacity,
        ..TrackerConfig::default()
    }
}

#[tokio::test]
async fn test_state_survives_restart() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rounds.db");

    let before = {
        let store = SqliteStore::open(&path).unwrap();
        let tracker = RoundTracker::open(store, "identity", config(256)).await.unwrap();
        for rid in [0, 1, 2, 10, 11, 200] {
            tracker.check(rid).await.unwrap();
        }
        tracker.force_check(700).await.unwrap();
        tracker.check(650).await.unwrap();
        assert!(tracker.persist().await.unwrap());
        tracker.snapshot().await
    };

    let store = SqliteStore::open(&path).unwrap();
    let tracker = RoundTracker::open(store, "identity", config(256)).await.unwrap();
    assert_eq!(tracker.snapshot().await, before);
    assert!(tracker.checked(650).await);
    assert!(tracker.checked(700).await);
    assert!(!tracker.checked(699).await);
}

#[tokio::test]
async fn test_keys_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rounds.db");

    let a = RoundTracker::open(SqliteStore::open(&path).unwrap(), "a", config(128))
        .await
        .unwrap();
    let b = RoundTracker::open(SqliteStore::open(&path).unwrap(), "b", config(128))
        .await
        .unwrap();

    a.check(5).await.unwrap();
    a.persist().await.unwrap();
    b.persist().await.unwrap();

    let reopened = RoundTracker::open(SqliteStore::open(&path).unwrap(), "b", config(128))
        .await
        .unwrap();
    assert!(!reopened.checked(5).await);
    assert_eq!(reopened.last_checked().await, 0);
}

#[tokio::test]
async fn test_export_matches_wire_layout() {
    let tracker = RoundTracker::open(MemoryStore::new(), "identity", config(128))
        .await
        .unwrap();
    tracker.check(3).await.unwrap();
    tracker.check(100).await.unwrap();

    assert_eq!(
        hex::encode(tracker.export().await),
        "00000000000000006400000000000000\
         0100030160011b"
    );
}

#[tokio::test]
async fn test_catch_up_from_peer() {
    init_tracing();
    let peer = RoundTracker::open(MemoryStore::new(), "peer", config(256))
        .await
        .unwrap();
    for rid in 0..=40 {
        if rid % 7 != 3 {
            peer.check(rid).await.unwrap();
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let local_config = TrackerConfig {
        persist_on_check: true,
        ..config(256)
    };
    let local = RoundTracker::open(
        SqliteStore::open(dir.path().join("local.db")).unwrap(),
        "local",
        local_config,
    )
    .await
    .unwrap();
    local.check(20).await.unwrap();

    let mut asked: Vec<RoundId> = Vec::new();
    let marked = local
        .check_against_peer(&peer.export().await, |rid| {
            asked.push(rid);
            true
        })
        .await
        .unwrap();

    // Only rounds the peer resolved are looked up, and never one we already had.
    assert!(!asked.contains(&20));
    for rid in &asked {
        assert!(peer.checked(*rid).await, "asked about round {} the peer lacks", rid);
    }
    assert_eq!(marked, asked.len());

    let snapshot = local.snapshot().await;
    for rid in 0..=40 {
        assert_eq!(snapshot.checked(rid), peer.checked(rid).await || rid == 20);
    }

    // persist_on_check already wrote everything.
    assert!(!local.persist().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checks() {
    let tracker = Arc::new(
        RoundTracker::open(SqliteStore::open_memory().unwrap(), "identity", config(1024))
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for worker in 0..8u64 {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            for i in 0..50u64 {
                tracker.force_check(worker * 50 + i).await.unwrap();
            }
            tracker.persist().await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for rid in 0..400 {
        assert!(tracker.checked(rid).await, "round {} not checked", rid);
    }
    assert_eq!(tracker.first_unchecked().await, 400);
}
