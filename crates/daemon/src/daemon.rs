// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Daemon`: wires [`ReconciliationEngine`] and [`WorkerLifecycle`] around
//! one [`EventBus`] and [`SharedWorkerIndex`], and restores worker state
//! from the worktree directory on startup (spec §9's worktree-only
//! persistence model — there is no separate index file to replay).

use crate::config::Config;
use orchestra_adapters::platform::Platform;
use orchestra_adapters::session::SessionAdapter;
use orchestra_adapters::terminal::TerminalSessionManager;
use orchestra_adapters::GitOps;
use orchestra_core::id::IdGen;
use orchestra_core::worker::SessionId;
use orchestra_core::{ContainerRef, Worker, WorkerId, WorkerStatus};
use orchestra_engine::{EventBus, ReconciliationEngine, SharedWorkerIndex, TodoSource, WorkerIndex, WorkerLifecycle, WorktreeStore};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("lifecycle operation failed: {0}")]
    Lifecycle(#[from] orchestra_engine::LifecycleError),
    #[error("worker {0} not found")]
    WorkerNotFound(WorkerId),
    #[error("terminal session failed: {0}")]
    Session(String),
}

/// Everything one running daemon instance owns.
pub struct Daemon<P: Platform, S: SessionAdapter> {
    pub bus: EventBus,
    pub index: SharedWorkerIndex,
    pub engine: Arc<ReconciliationEngine<P, orchestra_core::SystemClock>>,
    pub lifecycle: Arc<WorkerLifecycle<P, S>>,
    terminal: TerminalSessionManager<S>,
    session_prefix: String,
}

impl<P: Platform, S: SessionAdapter> Daemon<P, S> {
    /// Construct a daemon and restore any workers found under
    /// `repo_path`'s worktree directory before the reconciliation loop
    /// and lifecycle operations are wired up to use them.
    #[allow(clippy::too_many_arguments)]
    pub async fn startup(
        config: &Config,
        platform: P,
        terminal_adapter: S,
        id_gen: Arc<dyn IdGen>,
        repo_path: PathBuf,
        assistant_command: impl Into<String>,
        todo_source: Option<Arc<dyn TodoSource>>,
    ) -> Self {
        let bus = EventBus::new();
        let index = WorkerIndex::shared();
        let worktrees_root = repo_path.join(&config.worktree_subdir);

        let store = WorktreeStore::new(platform.clone(), config.worker_prefix.clone());
        let restored = store.scan(&worktrees_root).await;
        {
            let mut guard = index.lock().await;
            for metadata in restored {
                guard.insert(worker_from_metadata(metadata));
            }
            tracing::info!(count = guard.len(), "restored workers from worktree metadata");
        }

        let terminal = TerminalSessionManager::new(terminal_adapter, config.session_prefix.clone());

        let engine = Arc::new(ReconciliationEngine::new(
            orchestra_engine::StatusParser::new(platform.clone()),
            GitOps::new(),
            todo_source,
            bus.clone(),
            worktrees_root,
            index.clone(),
            orchestra_core::SystemClock,
            config.polling_config(),
        ));

        let lifecycle = Arc::new(WorkerLifecycle::new(
            platform,
            GitOps::new(),
            terminal.clone(),
            bus.clone(),
            index.clone(),
            id_gen,
            repo_path,
            config.worktree_subdir.clone(),
            config.worker_prefix.clone(),
            assistant_command,
            None,
        ));

        Self {
            bus,
            index,
            engine,
            lifecycle,
            terminal,
            session_prefix: config.session_prefix.clone(),
        }
    }

    pub fn start(&self) {
        self.engine.start();
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    pub async fn create_workers(&self, count: usize, container_ref: Option<String>) -> Result<Vec<Worker>, DaemonError> {
        let container_ref = container_ref.map(ContainerRef);
        Ok(self.lifecycle.create(count, container_ref).await?)
    }

    pub async fn delete_worker(&self, id: WorkerId) -> Result<(), DaemonError> {
        self.lifecycle.delete(id).await?;
        self.engine.cleanup_worker(id).await;
        Ok(())
    }

    pub async fn rename_worker(&self, id: WorkerId, new_name: String) -> Result<Worker, DaemonError> {
        Ok(self.lifecycle.rename(id, new_name).await?)
    }

    /// Send literal text to a worker's terminal session, optionally
    /// pressing Enter, routed through the container-mirrored path if the
    /// worker has a container reference (spec §4.7).
    pub async fn send_to_worker(&self, id: WorkerId, text: &str, press_enter: bool) -> Result<(), DaemonError> {
        let worker = self.worker(id).await?;
        let session_name = self.terminal.session_name(worker.session_id.as_str());
        let result = if worker.container_ref.as_ref().is_some_and(|c| !c.is_unisolated()) {
            self.terminal.container_send_text(&session_name, text, press_enter).await
        } else {
            self.terminal.send_text(&session_name, text, press_enter).await
        };
        result.map_err(|e| DaemonError::Session(e.to_string()))
    }

    pub async fn start_assistant(&self, id: WorkerId, assistant_command: &str) -> Result<(), DaemonError> {
        let worker = self.worker(id).await?;
        let session_name = self.terminal.session_name(worker.session_id.as_str());
        self.terminal
            .setup_alias(&session_name, assistant_command, worker.session_id.as_str())
            .await
            .map_err(|e| DaemonError::Session(e.to_string()))?;
        self.terminal
            .send_text(&session_name, assistant_command, true)
            .await
            .map_err(|e| DaemonError::Session(e.to_string()))
    }

    /// Report the terminal session a dashboard should bring to the
    /// foreground for this worker (`command:focus_worker`); there is no
    /// other backend state to change, since "focus" is purely a UI concern.
    pub async fn focus_worker(&self, id: WorkerId) -> Result<String, DaemonError> {
        let worker = self.worker(id).await?;
        Ok(self.terminal.session_name(worker.session_id.as_str()))
    }

    /// Swap a worker's symbolic container reference (`command:change_container`).
    /// Actually provisioning or tearing down the container itself is outside
    /// this engine's scope; this only updates the tracked reference and
    /// emits the matching `container:*` event.
    pub async fn change_container(&self, id: WorkerId, container_ref: String) -> Result<Worker, DaemonError> {
        let mut guard = self.index.lock().await;
        let previous = guard.get(id).cloned().ok_or(DaemonError::WorkerNotFound(id))?;
        let previous_ref = previous.container_ref.clone();

        let mut updated = previous;
        let new_ref = ContainerRef(container_ref.clone());
        let became_isolated = !new_ref.is_unisolated();
        updated.container_ref = Some(new_ref);
        guard.insert(updated.clone());
        drop(guard);

        if became_isolated {
            self.bus.emit(orchestra_core::Event::ContainerCreated {
                worker_id: id,
                container_ref,
            });
        } else if let Some(previous_ref) = previous_ref.filter(|r| !r.is_unisolated()) {
            self.bus.emit(orchestra_core::Event::ContainerRemoved {
                worker_id: id,
                container_ref: previous_ref.0,
            });
        }

        Ok(updated)
    }

    /// Drop every worker whose status is `Stopped`, tearing down its
    /// worktree, branch, and terminal session (the `command:cleanup`
    /// housekeeping sweep from spec §6).
    pub async fn cleanup(&self) -> Result<Vec<WorkerId>, DaemonError> {
        let stopped: Vec<WorkerId> = {
            let guard = self.index.lock().await;
            guard
                .workers()
                .into_iter()
                .filter(|w| w.status == WorkerStatus::Stopped)
                .map(|w| w.id)
                .collect()
        };
        for id in &stopped {
            self.delete_worker(*id).await?;
        }
        Ok(stopped)
    }

    async fn worker(&self, id: WorkerId) -> Result<Worker, DaemonError> {
        self.index
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or(DaemonError::WorkerNotFound(id))
    }

    pub fn session_prefix(&self) -> &str {
        &self.session_prefix
    }
}

fn worker_from_metadata(metadata: orchestra_engine::AgentMetadata) -> Worker {
    Worker {
        id: WorkerId(metadata.id),
        session_id: SessionId::new(metadata.session_id),
        name: metadata.name,
        branch: metadata.branch,
        repo_path: metadata.repo_path,
        worktree_path: metadata.worktree_path,
        status: WorkerStatus::Idle,
        pending_approval: None,
        todos: Vec::new(),
        diff_stats: orchestra_core::DiffStats::default(),
        last_interaction_time: 0,
        container_ref: metadata.container_config_name.map(ContainerRef),
        session_started: metadata.session_started,
        task_file: metadata.task_file,
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
