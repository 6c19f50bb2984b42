// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchestra_core::SystemClock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

async fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !predicate() {
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn native_change_triggers_a_debounced_tick() {
    let dir = tempdir().unwrap();
    let changes = Arc::new(AtomicUsize::new(0));
    let changes2 = changes.clone();

    let watcher = FileWatcher::start(
        vec![dir.path().to_path_buf()],
        vec![],
        FileWatcherConfig {
            poll_interval: Duration::from_secs(60),
            debounce: Duration::from_millis(50),
            health_check_interval: Duration::from_secs(60),
        },
        SystemClock,
        move |trigger| {
            if trigger == WatchTrigger::Change {
                changes2.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    tokio::fs::write(dir.path().join("status"), "working").await.unwrap();

    wait_until(|| changes.load(Ordering::SeqCst) > 0, Duration::from_secs(3)).await;
    assert!(changes.load(Ordering::SeqCst) > 0);

    watcher.stop();
}

#[tokio::test]
async fn rapid_writes_within_debounce_window_coalesce_into_one_tick() {
    let dir = tempdir().unwrap();
    let changes = Arc::new(AtomicUsize::new(0));
    let changes2 = changes.clone();

    let watcher = FileWatcher::start(
        vec![dir.path().to_path_buf()],
        vec![],
        FileWatcherConfig {
            poll_interval: Duration::from_secs(60),
            debounce: Duration::from_millis(200),
            health_check_interval: Duration::from_secs(60),
        },
        SystemClock,
        move |trigger| {
            if trigger == WatchTrigger::Change {
                changes2.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    for i in 0..5 {
        tokio::fs::write(dir.path().join("status"), format!("tick-{i}")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Give the debounce window time to elapse once quiet.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(changes.load(Ordering::SeqCst), 1);

    watcher.stop();
}

#[tokio::test]
async fn backup_poll_fires_even_without_any_filesystem_activity() {
    let dir = tempdir().unwrap();
    let polls = Arc::new(AtomicUsize::new(0));
    let polls2 = polls.clone();

    let watcher = FileWatcher::start(
        vec![dir.path().to_path_buf()],
        vec![],
        FileWatcherConfig {
            poll_interval: Duration::from_millis(50),
            debounce: Duration::from_millis(500),
            health_check_interval: Duration::from_secs(60),
        },
        SystemClock,
        move |trigger| {
            if trigger == WatchTrigger::Poll {
                polls2.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    wait_until(|| polls.load(Ordering::SeqCst) >= 2, Duration::from_secs(2)).await;
    assert!(polls.load(Ordering::SeqCst) >= 2);

    watcher.stop();
}

#[tokio::test]
async fn stop_is_idempotent_and_marks_the_watcher_stopped() {
    let dir = tempdir().unwrap();
    let watcher = FileWatcher::start(
        vec![dir.path().to_path_buf()],
        vec![],
        FileWatcherConfig::default(),
        SystemClock,
        |_| {},
    );

    assert!(!watcher.is_stopped());
    watcher.stop();
    watcher.stop();
    assert!(watcher.is_stopped());
}

#[test]
fn excluded_paths_are_filtered_out_of_native_change_notifications() {
    assert!(is_excluded(Path::new("/repo/.git/index"), &[".git/".to_string()]));
    assert!(is_excluded(
        Path::new("/repo/node_modules/pkg/file.js"),
        &["node_modules/".to_string()]
    ));
    assert!(!is_excluded(Path::new("/repo/src/main.rs"), &[".git/".to_string()]));
}
