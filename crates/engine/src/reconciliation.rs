// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ReconciliationEngine`: the scheduler that keeps `Worker` values in sync
//! with their on-disk ground truth (spec §4.8).
//!
//! Three independent pollers run concurrently — status, todos, diff stats —
//! each woken by a [`FileWatcher`] tick (native change or backup poll) or,
//! for todos, a plain interval. Every tick runs one *transaction*: lock the
//! shared [`WorkerIndex`] (the `update_mutex`), snapshot the worker ids,
//! iterate them, compute successor values, apply them, and emit events —
//! all while still holding the lock, so no other transaction or lifecycle
//! operation can observe a partially-applied tick.

use crate::event_bus::EventBus;
use crate::file_watcher::{FileWatcher, FileWatcherConfig, WatchTrigger};
use crate::status_parser::StatusParser;
use crate::worker_index::SharedWorkerIndex;
use async_trait::async_trait;
use orchestra_adapters::platform::Platform;
use orchestra_adapters::GitOps;
use orchestra_core::event::{ErrorCode, ErrorSource};
use orchestra_core::worker::status_delta_to_event;
use orchestra_core::{Clock, Event, TodoItem, WorkerId, WorkerStatus};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Supplies a worker's todo list from wherever the assistant reports it
/// (e.g. a `.orchestra/todos.json` file). Optional: a deployment with no
/// todo tracking passes `None` and the todos poller never starts.
#[async_trait]
pub trait TodoSource: Send + Sync + 'static {
    async fn todos(&self, worktree_path: &std::path::Path) -> Option<Vec<TodoItem>>;
}

pub struct PollingConfig {
    pub status_poll_interval: Duration,
    pub status_debounce: Duration,
    pub todo_interval: Duration,
    /// Zero disables the backup diff poll (native watching still runs).
    pub diff_interval: Duration,
    pub diff_debounce: Duration,
    pub health_check_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            status_poll_interval: Duration::from_secs(5),
            status_debounce: Duration::from_millis(100),
            todo_interval: Duration::from_secs(2),
            diff_interval: Duration::from_secs(60),
            diff_debounce: Duration::from_millis(500),
            health_check_interval: Duration::from_secs(60),
        }
    }
}

const DIFF_EXCLUDES: [&str; 3] = ["/.git/", "/node_modules/", "/.orchestra/"];

pub struct ReconciliationEngine<P: Platform, C: Clock> {
    status_parser: Arc<StatusParser<P>>,
    git: Arc<GitOps>,
    todo_source: Option<Arc<dyn TodoSource>>,
    bus: EventBus,
    worktrees_root: PathBuf,
    index: SharedWorkerIndex,
    clock: C,
    config: PollingConfig,
    cancel: std::sync::Mutex<CancellationToken>,
    polling: Arc<AtomicBool>,
    watchers: std::sync::Mutex<Vec<FileWatcher<C>>>,
}

impl<P: Platform, C: Clock> ReconciliationEngine<P, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        status_parser: StatusParser<P>,
        git: GitOps,
        todo_source: Option<Arc<dyn TodoSource>>,
        bus: EventBus,
        worktrees_root: PathBuf,
        index: SharedWorkerIndex,
        clock: C,
        config: PollingConfig,
    ) -> Self {
        Self {
            status_parser: Arc::new(status_parser),
            git: Arc::new(git),
            todo_source,
            bus,
            worktrees_root,
            index,
            clock,
            config,
            cancel: std::sync::Mutex::new(CancellationToken::new()),
            polling: Arc::new(AtomicBool::new(false)),
            watchers: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    /// Idempotent: a second call while already polling is a no-op.
    pub fn start(&self) {
        if self.polling.swap(true, Ordering::SeqCst) {
            return;
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = cancel.clone();

        let (status_tx, status_rx) = mpsc::unbounded_channel::<()>();
        let status_watcher = FileWatcher::start(
            vec![self.worktrees_root.clone()],
            Vec::new(),
            FileWatcherConfig {
                poll_interval: self.config.status_poll_interval,
                debounce: self.config.status_debounce,
                health_check_interval: self.config.health_check_interval,
            },
            self.clock.clone(),
            move |_trigger: WatchTrigger| {
                let _ = status_tx.send(());
            },
        );

        let mut watchers = vec![status_watcher];
        self.spawn_status_loop(status_rx, cancel.clone());

        if self.config.diff_interval > Duration::ZERO {
            let (diff_tx, diff_rx) = mpsc::unbounded_channel::<()>();
            let diff_watcher = FileWatcher::start(
                vec![self.worktrees_root.clone()],
                DIFF_EXCLUDES.iter().map(|s| s.to_string()).collect(),
                FileWatcherConfig {
                    poll_interval: self.config.diff_interval,
                    debounce: self.config.diff_debounce,
                    health_check_interval: self.config.health_check_interval,
                },
                self.clock.clone(),
                move |_trigger: WatchTrigger| {
                    let _ = diff_tx.send(());
                },
            );
            watchers.push(diff_watcher);
            self.spawn_diff_loop(diff_rx, cancel.clone());
        }

        if let Some(todo_source) = self.todo_source.clone() {
            self.spawn_todo_loop(todo_source, cancel.clone());
        }

        *self.watchers.lock().unwrap_or_else(|e| e.into_inner()) = watchers;
    }

    pub fn stop(&self) {
        if !self.polling.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).cancel();
        self.watchers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .for_each(FileWatcher::stop);
    }

    /// Drop a worker's state machine entry. Called by `WorkerLifecycle` as
    /// the last step of `delete()`, after the index entry itself is gone —
    /// a no-op here since the index owns both together, kept as an explicit
    /// step so lifecycle code reads the same way spec §4.8 describes it.
    pub async fn cleanup_worker(&self, id: WorkerId) {
        self.index.lock().await.remove(id);
    }

    fn spawn_status_loop(&self, mut rx: mpsc::UnboundedReceiver<()>, cancel: CancellationToken) {
        let index = self.index.clone();
        let status_parser = self.status_parser.clone();
        let bus = self.bus.clone();
        let clock = self.clock.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => {
                        if received.is_none() {
                            break;
                        }
                        run_status_transaction(&index, &status_parser, &bus, &clock, &cancel).await;
                    }
                }
            }
        });
    }

    fn spawn_diff_loop(&self, mut rx: mpsc::UnboundedReceiver<()>, cancel: CancellationToken) {
        let index = self.index.clone();
        let git = self.git.clone();
        let bus = self.bus.clone();

        tokio::spawn(async move {
            // One delayed one-shot tick shortly after start, so a freshly
            // created worker's initial diff (usually zero) is published
            // promptly instead of waiting a full backup interval.
            tokio::time::sleep(Duration::from_secs(1)).await;
            if !cancel.is_cancelled() {
                run_diff_transaction(&index, &git, &bus, &cancel).await;
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => {
                        if received.is_none() {
                            break;
                        }
                        run_diff_transaction(&index, &git, &bus, &cancel).await;
                    }
                }
            }
        });
    }

    fn spawn_todo_loop(&self, todo_source: Arc<dyn TodoSource>, cancel: CancellationToken) {
        let index = self.index.clone();
        let bus = self.bus.clone();
        let interval_duration = self.config.todo_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        run_todo_transaction(&index, todo_source.as_ref(), &bus, &cancel).await;
                    }
                }
            }
        });
    }
}

async fn run_status_transaction<P: Platform, C: Clock>(
    index: &SharedWorkerIndex,
    status_parser: &StatusParser<P>,
    bus: &EventBus,
    clock: &C,
    cancel: &CancellationToken,
) {
    let mut guard = index.lock().await;
    for id in guard.ids() {
        if cancel.is_cancelled() {
            break;
        }
        let Some(worker) = guard.get(id) else { continue };
        let worktree_path = worker.worktree_path.clone();
        let current_status = worker.status;

        let Some(parsed) = status_parser.parse(&worktree_path).await else {
            continue;
        };
        if cancel.is_cancelled() {
            break;
        }
        let Some(event) = status_delta_to_event(current_status, parsed.status) else {
            continue;
        };

        let Some(entry) = guard.entry_mut(id) else { continue };
        // Defensive sync (spec §4.8 step b): the machine's tracked state
        // should already equal `w.status` (it's forced on every insert),
        // but never let the two silently disagree before validating event.
        if entry.machine.current() != current_status {
            entry.machine.force_state(current_status);
        }

        if let Err(invalid) = entry.machine.transition(event) {
            // The state machine never forces state on a rejected
            // transition (spec §4.1) — log and move on, worker untouched.
            tracing::warn!(
                worker_id = %id,
                event = ?event,
                current = %current_status,
                "observed status implies an event not valid from the current state"
            );
            bus.emit(Event::ErrorRecoverable {
                source: ErrorSource::ReconciliationEngine,
                code: ErrorCode::new("INVALID_STATE_TRANSITION"),
                message: invalid.to_string(),
                context: std::collections::HashMap::from([
                    ("worker_id".to_string(), id.to_string()),
                    ("event".to_string(), format!("{event:?}")),
                ]),
                recovery_action: None,
            });
            continue;
        }

        let previous = entry.worker.clone();
        let updated = previous.with_status(parsed.status, parsed.pending_approval.clone(), clock.epoch_ms());
        entry.worker = updated.clone();

        bus.emit(Event::WorkerStatusChanged {
            worker: updated.clone(),
            previous_status: previous.status,
        });

        if updated.status == WorkerStatus::WaitingApproval {
            if let Some(description) = updated.pending_approval.clone() {
                bus.emit(Event::ApprovalPending {
                    approval: orchestra_core::event::Approval {
                        worker_id: id,
                        description,
                        timestamp: clock.epoch_ms(),
                    },
                });
            }
        } else if previous.status == WorkerStatus::WaitingApproval {
            bus.emit(Event::ApprovalResolved { worker_id: id });
        }
    }
}

async fn run_diff_transaction(index: &SharedWorkerIndex, git: &GitOps, bus: &EventBus, cancel: &CancellationToken) {
    let mut guard = index.lock().await;
    for id in guard.ids() {
        if cancel.is_cancelled() {
            break;
        }
        let Some(worker) = guard.get(id) else { continue };
        let worktree_path = worker.worktree_path.clone();
        let repo_path = worker.repo_path.clone();
        let previous_stats = worker.diff_stats;

        let base = match git.base_branch(&repo_path).await {
            Ok(base) => base,
            Err(e) => {
                emit_git_error(bus, id, &e.to_string());
                continue;
            }
        };

        if cancel.is_cancelled() {
            break;
        }

        match git.diff_stats(&worktree_path, &base).await {
            Ok(raw_stats) => {
                let stats = to_core_diff_stats(raw_stats);
                if stats == previous_stats {
                    continue;
                }
                let Some(entry) = guard.entry_mut(id) else { continue };
                entry.worker = entry.worker.with_diff_stats(stats);
                bus.emit(Event::WorkerDiffStatsChanged {
                    worker: entry.worker.clone(),
                    previous_diff_stats: previous_stats,
                });
            }
            Err(e) => emit_git_error(bus, id, &e.to_string()),
        }
    }
}

fn to_core_diff_stats(stats: orchestra_adapters::DiffStats) -> orchestra_core::DiffStats {
    orchestra_core::DiffStats {
        files_changed: stats.files_changed,
        insertions: stats.insertions,
        deletions: stats.deletions,
    }
}

async fn run_todo_transaction(
    index: &SharedWorkerIndex,
    todo_source: &dyn TodoSource,
    bus: &EventBus,
    cancel: &CancellationToken,
) {
    let mut guard = index.lock().await;
    for id in guard.ids() {
        if cancel.is_cancelled() {
            break;
        }
        let Some(worker) = guard.get(id) else { continue };
        let worktree_path = worker.worktree_path.clone();
        let previous_todos = worker.todos.clone();

        let Some(todos) = todo_source.todos(&worktree_path).await else {
            continue;
        };
        if cancel.is_cancelled() {
            break;
        }
        if todos == previous_todos {
            continue;
        }

        let Some(entry) = guard.entry_mut(id) else { continue };
        entry.worker = entry.worker.with_todos(todos);
        bus.emit(Event::WorkerTodosChanged {
            worker: entry.worker.clone(),
            previous_todos,
        });
    }
}

fn emit_git_error(bus: &EventBus, worker_id: WorkerId, message: &str) {
    bus.emit(Event::ErrorRecoverable {
        source: ErrorSource::ReconciliationEngine,
        code: ErrorCode::new("GIT_COMMAND_FAILURE"),
        message: message.to_string(),
        context: std::collections::HashMap::from([("worker_id".to_string(), worker_id.to_string())]),
        recovery_action: Some("keeping previous diff stats until the next successful poll".to_string()),
    });
}

#[cfg(test)]
#[path = "reconciliation_tests.rs"]
mod tests;
