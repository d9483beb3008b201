//! Integration tests for watch mode and graceful shutdown
//!
//! These tests verify that:
//! - Arrivals are emitted once their size has settled
//! - Each arrival is emitted once
//! - The watch loop stops promptly on the shutdown signal

use hrsn_orch::core::ingress::{IngressEntry, IngressWatcher, OBSERVABILITY_FILE};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_watch_emits_settled_arrivals_until_shutdown() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    let seen: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let watcher = IngressWatcher::new(&root, Duration::from_millis(20));
    let sink = Arc::clone(&seen);
    let handle = tokio::spawn(async move {
        watcher
            .watch(shutdown_rx, move |entry: IngressEntry| {
                sink.lock().unwrap().push(entry.fs_path)
            })
            .await
    });

    std::fs::write(root.join(OBSERVABILITY_FILE), "{}").unwrap();
    std::fs::write(root.join("SCREENING_A.csv"), "a\n1\n").unwrap();
    assert!(wait_for(|| seen.lock().unwrap().len() == 1).await);

    std::fs::write(root.join("SCREENING_B.csv"), "b\n2\n").unwrap();
    assert!(wait_for(|| seen.lock().unwrap().len() == 2).await);

    // several more polls: nothing is emitted twice
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(seen.lock().unwrap().len(), 2);

    shutdown_tx.send(true).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("watch loop should stop after shutdown")
        .unwrap();
    assert!(result.is_ok());

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], root.join("SCREENING_A.csv"));
    assert_eq!(seen[1], root.join("SCREENING_B.csv"));
}

#[tokio::test]
async fn test_watch_returns_immediately_when_already_shut_down() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("SCREENING_A.csv"), "a\n").unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(true);

    let watcher = IngressWatcher::new(dir.path(), Duration::from_secs(60));
    let mut emitted = 0;
    tokio::time::timeout(Duration::from_secs(1), watcher.watch(shutdown_rx, |_| emitted += 1))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(emitted, 0);
}

#[tokio::test]
async fn test_watch_stops_when_sender_dropped() {
    let dir = TempDir::new().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = IngressWatcher::new(dir.path(), Duration::from_secs(60));

    drop(shutdown_tx);
    tokio::time::timeout(Duration::from_secs(1), watcher.watch(shutdown_rx, |_| {}))
        .await
        .expect("watch loop should stop when the signal source is gone")
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    assert!(!*shutdown_rx2.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}
