// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios exercising the reconciliation engine and worker
//! lifecycle together against a real git repository and a real filesystem,
//! with a fake terminal backend standing in for tmux.

use orchestra_adapters::platform::Platform;
use orchestra_adapters::session::FakeSessionAdapter;
use orchestra_adapters::terminal::TerminalSessionManager;
use orchestra_adapters::{GitOps, RealPlatform};
use orchestra_core::id::SequentialIdGen;
use orchestra_core::{Event, NameGenerator, SystemClock, WorkerStatus};
use orchestra_engine::{
    EventBus, PollingConfig, ReconciliationEngine, StatusParser, WorkerIndex, WorkerLifecycle,
    WorktreeStore,
};
use std::path::Path;
use std::process::Command as StdCommand;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tempfile::TempDir;

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

fn recorder(bus: &EventBus) -> Arc<StdMutex<Vec<Event>>> {
    let events: Arc<StdMutex<Vec<Event>>> = Arc::new(StdMutex::new(Vec::new()));
    for kind in [
        "worker:created",
        "worker:renamed",
        "worker:deleted",
        "worker:terminal_created",
        "worker:status_changed",
        "approval:pending",
        "approval:resolved",
        "error:recoverable",
    ] {
        let sink = events.clone();
        bus.subscribe(kind, move |event| sink.lock().unwrap().push(event.clone()));
    }
    events
}

/// Short, test-friendly polling config: fast enough that assertions don't
/// need multi-second sleeps, slow enough to not starve the executor.
fn fast_polling_config() -> PollingConfig {
    PollingConfig {
        status_poll_interval: Duration::from_millis(30),
        status_debounce: Duration::from_millis(10),
        todo_interval: Duration::from_secs(60),
        diff_interval: Duration::ZERO, // disable diff polling, not under test here
        diff_debounce: Duration::from_millis(10),
        health_check_interval: Duration::from_secs(60),
    }
}

fn write_status(worktree: &Path, file_name: &str, contents: &str) {
    let dir = worktree.join(".orchestra/status");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(file_name), contents).unwrap();
}

async fn wait_until<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

struct Harness {
    repo: TempDir,
    bus: EventBus,
    events: Arc<StdMutex<Vec<Event>>>,
    index: orchestra_engine::SharedWorkerIndex,
    lifecycle: WorkerLifecycle<RealPlatform, FakeSessionAdapter>,
    engine: ReconciliationEngine<RealPlatform, SystemClock>,
    terminal: TerminalSessionManager<FakeSessionAdapter>,
}

fn build_harness() -> Harness {
    let repo = git_repo_with_one_commit();
    let bus = EventBus::new();
    let events = recorder(&bus);
    let index = WorkerIndex::shared();
    let terminal = TerminalSessionManager::new(FakeSessionAdapter::new(), "orchestra");

    let lifecycle = WorkerLifecycle::new(
        RealPlatform::new(),
        GitOps::new(),
        terminal.clone(),
        bus.clone(),
        index.clone(),
        Arc::new(SequentialIdGen::new("session")),
        repo.path().to_path_buf(),
        ".worktrees",
        "claude",
        "claude",
        None,
    );

    // Matches Daemon::startup's derivation exactly: the engine watches and
    // scans the same root the lifecycle creates worktrees under.
    let worktrees_root = repo.path().join(".worktrees");

    let engine = ReconciliationEngine::new(
        StatusParser::new(RealPlatform::new()),
        GitOps::new(),
        None,
        bus.clone(),
        worktrees_root,
        index.clone(),
        SystemClock,
        fast_polling_config(),
    );

    Harness {
        repo,
        bus,
        events,
        index,
        lifecycle,
        engine,
        terminal,
    }
}

#[tokio::test]
async fn scenario_1_create_worker_and_observe_status_progression() {
    let h = build_harness();

    let created = h.lifecycle.create(1, None).await.unwrap();
    assert_eq!(created.len(), 1);
    let worker = &created[0];
    assert_eq!(worker.name, "alpha");
    assert_eq!(worker.branch, "claude-alpha");
    assert_eq!(worker.status, WorkerStatus::Idle);
    assert_eq!(worker.pending_approval, None);
    assert_eq!(worker.diff_stats, orchestra_core::DiffStats::default());

    let metadata_path = worker.worktree_path.join(".orchestra/agent.json");
    assert!(metadata_path.exists());
    let raw = std::fs::read_to_string(&metadata_path).unwrap();
    let metadata: orchestra_engine::AgentMetadata = serde_json::from_str(&raw).unwrap();
    assert_eq!(metadata.name, "alpha");

    let expected_session_name = h.terminal.session_name(worker.session_id.as_str());
    assert!(expected_session_name.starts_with("orchestra-"));
    assert!(h.terminal.exists(&expected_session_name).await.unwrap());

    h.engine.start();

    write_status(
        &worker.worktree_path,
        "s1",
        r#"{"tool_name":"Bash","tool_input":{"command":"npm test"}}"#,
    );

    let worker_id = worker.id;
    let saw_waiting_approval = wait_until(Duration::from_millis(500), || {
        h.index
            .try_lock()
            .map(|g| g.get(worker_id).map(|w| w.status) == Some(WorkerStatus::WaitingApproval))
            .unwrap_or(false)
    })
    .await;
    assert!(saw_waiting_approval, "expected status to reach waiting-approval");

    {
        let guard = h.index.lock().await;
        let w = guard.get(worker_id).unwrap();
        assert_eq!(w.pending_approval.as_deref(), Some("Bash: npm test"));
    }

    assert!(h
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::ApprovalPending { .. })));

    write_status(&worker.worktree_path, "s1", r#"{"session_id":"abc"}"#);

    let saw_working_again = wait_until(Duration::from_millis(500), || {
        h.index
            .try_lock()
            .map(|g| g.get(worker_id).map(|w| w.status) == Some(WorkerStatus::Working))
            .unwrap_or(false)
    })
    .await;
    assert!(saw_working_again, "expected status to return to working via APPROVE");

    h.engine.stop();
}

#[tokio::test]
async fn scenario_2_invalid_transition_is_rejected() {
    let h = build_harness();
    let created = h.lifecycle.create(1, None).await.unwrap();
    let worker = &created[0];
    let worker_id = worker.id;
    assert_eq!(worker.status, WorkerStatus::Idle);

    h.engine.start();

    // Idle -> waiting-input has no direct transition: REQUEST_INPUT is only
    // valid from `working`.
    write_status(&worker.worktree_path, "s1", "waiting");

    let saw_error = wait_until(Duration::from_millis(500), || {
        h.events.lock().unwrap().iter().any(|e| match e {
            Event::ErrorRecoverable { code, .. } => code.0 == "INVALID_STATE_TRANSITION",
            _ => false,
        })
    })
    .await;
    assert!(saw_error, "expected an INVALID_STATE_TRANSITION error");

    h.engine.stop();

    let guard = h.index.lock().await;
    assert_eq!(guard.get(worker_id).unwrap().status, WorkerStatus::Idle);
    drop(guard);

    assert!(!h
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::WorkerStatusChanged { .. })));

    let error_count = h
        .events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::ErrorRecoverable { code, .. } if code.0 == "INVALID_STATE_TRANSITION"))
        .count();
    assert_eq!(error_count, 1);
}

#[tokio::test]
async fn scenario_3_delete_worker_cleans_up_fully() {
    let h = build_harness();
    let created = h.lifecycle.create(1, None).await.unwrap();
    let worker = created[0].clone();
    let session_name = h.terminal.session_name(worker.session_id.as_str());
    assert!(h.terminal.exists(&session_name).await.unwrap());

    h.lifecycle.delete(worker.id).await.unwrap();

    assert!(!worker.worktree_path.exists());

    let branches = StdCommand::new("git")
        .current_dir(h.repo.path())
        .args(["branch", "--list", &worker.branch])
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&branches.stdout).trim().is_empty());

    let sessions = h.terminal.list_sessions().await.unwrap();
    assert!(!sessions.contains(&session_name));

    let guard = h.index.lock().await;
    assert!(guard.get(worker.id).is_none());
    drop(guard);

    assert!(h
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, Event::WorkerDeleted { worker_id } if *worker_id == worker.id)));
}

#[tokio::test]
async fn scenario_4_restart_recovery_preserves_identity_without_duplicate_ids() {
    let h = build_harness();
    let created = h.lifecycle.create(2, None).await.unwrap();
    assert_eq!(created[0].name, "alpha");
    assert_eq!(created[1].name, "bravo");

    let worktrees_root = created[0].worktree_path.parent().unwrap().to_path_buf();

    // Fresh engine/index pointed at the same repo, as if the process had
    // restarted.
    let store = WorktreeStore::new(RealPlatform::new(), "claude");
    let scanned = store.scan(&worktrees_root).await;
    assert_eq!(scanned.len(), 2);

    let fresh_index = WorkerIndex::shared();
    {
        let mut guard = fresh_index.lock().await;
        for metadata in &scanned {
            let worker = orchestra_core::Worker {
                id: orchestra_core::WorkerId(metadata.id),
                session_id: orchestra_core::worker::SessionId::new(metadata.session_id.clone()),
                name: metadata.name.clone(),
                branch: metadata.branch.clone(),
                repo_path: metadata.repo_path.clone(),
                worktree_path: metadata.worktree_path.clone(),
                status: WorkerStatus::Idle,
                pending_approval: None,
                todos: Vec::new(),
                diff_stats: orchestra_core::DiffStats::default(),
                last_interaction_time: 0,
                container_ref: metadata.container_config_name.clone().map(orchestra_core::ContainerRef),
                session_started: metadata.session_started,
                task_file: metadata.task_file.clone(),
            };
            guard.insert(worker);
        }
    }

    let guard = fresh_index.lock().await;
    let mut ids: Vec<u64> = guard.ids().into_iter().map(|id| id.0).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
    for id in guard.ids() {
        assert_eq!(guard.get(id).unwrap().status, WorkerStatus::Idle);
    }
    drop(guard);

    // A fresh worker created after restart must not collide with either
    // recovered id.
    let terminal = TerminalSessionManager::new(FakeSessionAdapter::new(), "orchestra");
    let fresh_lifecycle = WorkerLifecycle::new(
        RealPlatform::new(),
        GitOps::new(),
        terminal,
        EventBus::new(),
        fresh_index.clone(),
        Arc::new(SequentialIdGen::new("session-2")),
        h.repo.path().to_path_buf(),
        ".worktrees",
        "claude",
        "claude",
        None,
    );
    let more = fresh_lifecycle.create(1, None).await.unwrap();
    assert_eq!(more[0].id.0, 3);
}

#[tokio::test]
async fn scenario_5_backup_polling_observes_a_status_change_without_relying_on_timing_luck() {
    let h = build_harness();
    let created = h.lifecycle.create(1, None).await.unwrap();
    let worker_id = created[0].id;
    let worktree_path = created[0].worktree_path.clone();

    h.engine.start();

    write_status(&worktree_path, "s1", "working");

    let observed = wait_until(Duration::from_millis(500), || {
        h.index
            .try_lock()
            .map(|g| g.get(worker_id).map(|w| w.status) == Some(WorkerStatus::Working))
            .unwrap_or(false)
    })
    .await;
    assert!(
        observed,
        "expected the status change to be observed within poll_interval + epsilon regardless of native delivery"
    );

    h.engine.stop();
}

#[test]
fn scenario_6_name_generator_exhausts_depth_one_then_grows() {
    let generator = NameGenerator::new();
    let nato = [
        "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india",
        "juliett", "kilo", "lima", "mike", "november", "oscar", "papa", "quebec", "romeo",
        "sierra", "tango", "uniform", "victor", "whiskey", "xray", "yankee", "zulu",
    ];
    let used: Vec<&str> = nato.to_vec();

    let next = generator.next_available(used, 3);
    assert_eq!(next, vec!["alpha-alpha", "alpha-bravo", "alpha-charlie"]);

    assert_eq!(NameGenerator::depth("alpha-alpha"), 2);
    assert_eq!(
        NameGenerator::compare("zulu", "alpha-alpha"),
        std::cmp::Ordering::Less
    );
}
