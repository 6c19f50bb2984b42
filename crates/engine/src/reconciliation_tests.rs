// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::worker_index::WorkerIndex;
use orchestra_adapters::FakePlatform;
use orchestra_core::worker::{DiffStats as CoreDiffStats, SessionId, Worker};
use orchestra_core::{FakeClock, TodoStatus};
use std::path::PathBuf;
use std::process::Command as StdCommand;
use std::sync::Mutex as StdMutex;
use tempfile::TempDir;

fn worker(id: u64, status: WorkerStatus, worktree_path: PathBuf, repo_path: PathBuf) -> Worker {
    Worker {
        id: WorkerId(id),
        session_id: SessionId::new(format!("session-{id}")),
        name: format!("worker-{id}"),
        branch: format!("claude-worker-{id}"),
        repo_path,
        worktree_path,
        status,
        pending_approval: None,
        todos: Vec::new(),
        diff_stats: CoreDiffStats::default(),
        last_interaction_time: 0,
        container_ref: None,
        session_started: true,
        task_file: None,
    }
}

const RECORDED_KINDS: &[&str] = &[
    "worker:status_changed",
    "worker:diff_stats_changed",
    "worker:todos_changed",
    "approval:pending",
    "approval:resolved",
    "error:recoverable",
];

fn recorder() -> (EventBus, Arc<StdMutex<Vec<Event>>>) {
    let bus = EventBus::new();
    let events = Arc::new(StdMutex::new(Vec::new()));
    for kind in RECORDED_KINDS {
        let sink = events.clone();
        bus.subscribe(kind, move |event| sink.lock().unwrap().push(event.clone()));
    }
    (bus, events)
}

#[tokio::test]
async fn status_transaction_applies_a_valid_transition_and_emits_status_changed() {
    let platform = FakePlatform::new();
    platform.set_file("/wt/.orchestra/status/1", "working").await;

    let index = WorkerIndex::shared();
    index
        .lock()
        .await
        .insert(worker(1, WorkerStatus::Idle, PathBuf::from("/wt"), PathBuf::from("/repo")));

    let parser = StatusParser::new(platform);
    let (bus, events) = recorder();
    let clock = FakeClock::new();

    run_status_transaction(&index, &parser, &bus, &clock, &CancellationToken::new()).await;

    let guard = index.lock().await;
    assert_eq!(guard.get(WorkerId(1)).unwrap().status, WorkerStatus::Working);
    drop(guard);
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::WorkerStatusChanged { .. })));
}

#[tokio::test]
async fn status_transaction_rejects_an_invalid_transition_and_keeps_status() {
    // Idle -> Stopped has no direct transition in the table (Stop only
    // applies from Working/WaitingInput/WaitingApproval): the engine must
    // reject it, emit error:recoverable, and leave the worker untouched.
    let platform = FakePlatform::new();
    platform.set_file("/wt/.orchestra/status/1", "stopped").await;

    let index = WorkerIndex::shared();
    index
        .lock()
        .await
        .insert(worker(1, WorkerStatus::Idle, PathBuf::from("/wt"), PathBuf::from("/repo")));

    let parser = StatusParser::new(platform);
    let (bus, events) = recorder();
    let clock = FakeClock::new();

    run_status_transaction(&index, &parser, &bus, &clock, &CancellationToken::new()).await;

    let guard = index.lock().await;
    assert_eq!(guard.get(WorkerId(1)).unwrap().status, WorkerStatus::Idle);
    drop(guard);

    let recorded = events.lock().unwrap();
    assert!(!recorded
        .iter()
        .any(|e| matches!(e, Event::WorkerStatusChanged { .. })));
    let error_count = recorded
        .iter()
        .filter(|e| match e {
            Event::ErrorRecoverable { code, .. } => code.0 == "INVALID_STATE_TRANSITION",
            _ => false,
        })
        .count();
    assert_eq!(error_count, 1);
}

#[tokio::test]
async fn status_transaction_emits_approval_pending_then_resolved() {
    let platform = FakePlatform::new();
    platform
        .set_file(
            "/wt/.orchestra/status/1",
            r#"{"tool_name":"Bash","tool_input":{"command":"rm -rf /tmp"}}"#,
        )
        .await;

    let index = WorkerIndex::shared();
    index
        .lock()
        .await
        .insert(worker(1, WorkerStatus::Working, PathBuf::from("/wt"), PathBuf::from("/repo")));

    let parser = StatusParser::new(platform.clone());
    let (bus, events) = recorder();
    let clock = FakeClock::new();

    run_status_transaction(&index, &parser, &bus, &clock, &CancellationToken::new()).await;
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::ApprovalPending { .. })));

    platform.set_file("/wt/.orchestra/status/1", "working").await;
    run_status_transaction(&index, &parser, &bus, &clock, &CancellationToken::new()).await;
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::ApprovalResolved { .. })));
}

#[tokio::test]
async fn status_transaction_leaves_worker_untouched_when_no_status_file_present() {
    let platform = FakePlatform::new();
    let index = WorkerIndex::shared();
    index
        .lock()
        .await
        .insert(worker(1, WorkerStatus::Working, PathBuf::from("/wt"), PathBuf::from("/repo")));

    let parser = StatusParser::new(platform);
    let (bus, events) = recorder();
    let clock = FakeClock::new();

    run_status_transaction(&index, &parser, &bus, &clock, &CancellationToken::new()).await;

    assert!(events.lock().unwrap().is_empty());
    let guard = index.lock().await;
    assert_eq!(guard.get(WorkerId(1)).unwrap().status, WorkerStatus::Working);
}

fn git_repo_with_one_commit() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let run = |args: &[&str]| {
        let status = StdCommand::new("git")
            .current_dir(dir.path())
            .args(args)
            .status()
            .unwrap();
        assert!(status.success());
    };
    run(&["init", "-q"]);
    run(&["config", "user.email", "test@example.com"]);
    run(&["config", "user.name", "test"]);
    std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
    run(&["add", "-A"]);
    run(&["commit", "-q", "-m", "initial"]);
    dir
}

#[tokio::test]
async fn diff_transaction_updates_stats_and_emits_diff_changed() {
    let repo = git_repo_with_one_commit();
    std::fs::write(repo.path().join("new.txt"), "content\n").unwrap();
    StdCommand::new("git")
        .current_dir(repo.path())
        .args(["add", "-A"])
        .status()
        .unwrap();

    let index = WorkerIndex::shared();
    index
        .lock()
        .await
        .insert(worker(1, WorkerStatus::Working, repo.path().to_path_buf(), repo.path().to_path_buf()));

    let git = GitOps::new();
    let (bus, events) = recorder();

    run_diff_transaction(&index, &git, &bus, &CancellationToken::new()).await;

    let guard = index.lock().await;
    let stats = guard.get(WorkerId(1)).unwrap().diff_stats;
    assert_eq!(stats.files_changed, 1);
    drop(guard);
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::WorkerDiffStatsChanged { .. })));
}

#[tokio::test]
async fn diff_transaction_keeps_previous_stats_on_git_failure() {
    let index = WorkerIndex::shared();
    index.lock().await.insert(worker(
        1,
        WorkerStatus::Working,
        PathBuf::from("/does/not/exist"),
        PathBuf::from("/does/not/exist"),
    ));

    let git = GitOps::new();
    let (bus, events) = recorder();

    run_diff_transaction(&index, &git, &bus, &CancellationToken::new()).await;

    let guard = index.lock().await;
    assert_eq!(guard.get(WorkerId(1)).unwrap().diff_stats, CoreDiffStats::default());
    drop(guard);
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::ErrorRecoverable { .. })));
}

#[tokio::test]
async fn diff_transaction_emits_nothing_once_cancelled() {
    let index = WorkerIndex::shared();
    index.lock().await.insert(worker(
        1,
        WorkerStatus::Working,
        PathBuf::from("/does/not/exist"),
        PathBuf::from("/does/not/exist"),
    ));

    let git = GitOps::new();
    let (bus, events) = recorder();
    let cancel = CancellationToken::new();
    cancel.cancel();

    run_diff_transaction(&index, &git, &bus, &cancel).await;

    assert!(events.lock().unwrap().is_empty());
}

struct StaticTodoSource(Vec<TodoItem>);

#[async_trait]
impl TodoSource for StaticTodoSource {
    async fn todos(&self, _worktree_path: &std::path::Path) -> Option<Vec<TodoItem>> {
        Some(self.0.clone())
    }
}

#[tokio::test]
async fn todo_transaction_updates_todos_and_emits_event_on_change() {
    let index = WorkerIndex::shared();
    index
        .lock()
        .await
        .insert(worker(1, WorkerStatus::Working, PathBuf::from("/wt"), PathBuf::from("/repo")));

    let source = StaticTodoSource(vec![TodoItem {
        status: TodoStatus::InProgress,
        content: "write tests".to_string(),
        active_form: Some("writing tests".to_string()),
    }]);
    let (bus, events) = recorder();

    run_todo_transaction(&index, &source, &bus, &CancellationToken::new()).await;

    let guard = index.lock().await;
    assert_eq!(guard.get(WorkerId(1)).unwrap().todos.len(), 1);
    drop(guard);
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::WorkerTodosChanged { .. })));

    // Re-running with the same todos emits nothing further.
    events.lock().unwrap().clear();
    run_todo_transaction(&index, &source, &bus, &CancellationToken::new()).await;
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn engine_start_and_stop_toggle_is_polling_idempotently() {
    let repo = git_repo_with_one_commit();
    let platform = FakePlatform::new();
    let parser = StatusParser::new(platform);
    let git = GitOps::new();
    let bus = EventBus::new();
    let index = WorkerIndex::shared();
    let clock = FakeClock::new();

    let engine = ReconciliationEngine::new(
        parser,
        git,
        None,
        bus,
        repo.path().to_path_buf(),
        index,
        clock,
        PollingConfig {
            status_poll_interval: Duration::from_millis(20),
            status_debounce: Duration::from_millis(5),
            todo_interval: Duration::from_millis(20),
            diff_interval: Duration::ZERO,
            diff_debounce: Duration::from_millis(5),
            health_check_interval: Duration::from_secs(60),
        },
    );

    assert!(!engine.is_polling());
    engine.start();
    assert!(engine.is_polling());
    engine.start();
    assert!(engine.is_polling());
    engine.stop();
    assert!(!engine.is_polling());
    engine.stop();
    assert!(!engine.is_polling());
}
