// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `WorkerLifecycle`: the only component permitted to create and destroy
//! workers (spec §4.9). Every operation locks the same [`SharedWorkerIndex`]
//! the reconciliation engine serializes on, so a create/rename/delete can
//! never interleave with a reconciliation tick and leave a worker half
//! set up.

use crate::event_bus::EventBus;
use crate::worker_index::SharedWorkerIndex;
use orchestra_adapters::platform::Platform;
use orchestra_adapters::session::SessionAdapter;
use orchestra_adapters::terminal::TerminalSessionManager;
use orchestra_adapters::{GitOps, GitOpsError};
use orchestra_core::id::IdGen;
use orchestra_core::worker::SessionId;
use orchestra_core::{ContainerRef, Event, NameGenerator, Worker, WorkerId};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("worker {0} not found")]
    NotFound(WorkerId),
    #[error("git operation failed: {0}")]
    Git(#[from] GitOpsError),
    #[error("worktree metadata failed: {0}")]
    Metadata(String),
    #[error("terminal session failed: {0}")]
    Session(String),
}

/// Where the coordination assets bundled with the orchestrator (hooks,
/// slash-commands, task-claimer) live before being copied into a fresh
/// worktree.
pub struct CoordinationAssets {
    pub source_dir: PathBuf,
}

pub struct WorkerLifecycle<P: Platform, S: SessionAdapter> {
    platform: P,
    git: GitOps,
    worktree_store: crate::worktree_store::WorktreeStore<P>,
    terminal: TerminalSessionManager<S>,
    bus: EventBus,
    index: SharedWorkerIndex,
    id_gen: Arc<dyn IdGen>,
    names: NameGenerator,
    repo_path: PathBuf,
    worktree_subdir: String,
    worker_prefix: String,
    assistant_command: String,
    coordination_assets: Option<CoordinationAssets>,
}

impl<P: Platform, S: SessionAdapter> WorkerLifecycle<P, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: P,
        git: GitOps,
        terminal: TerminalSessionManager<S>,
        bus: EventBus,
        index: SharedWorkerIndex,
        id_gen: Arc<dyn IdGen>,
        repo_path: PathBuf,
        worktree_subdir: impl Into<String>,
        worker_prefix: impl Into<String>,
        assistant_command: impl Into<String>,
        coordination_assets: Option<CoordinationAssets>,
    ) -> Self {
        let worker_prefix = worker_prefix.into();
        Self {
            worktree_store: crate::worktree_store::WorktreeStore::new(platform.clone(), worker_prefix.clone()),
            platform,
            git,
            terminal,
            bus,
            index,
            id_gen,
            names: NameGenerator::new(),
            repo_path,
            worktree_subdir: worktree_subdir.into(),
            worker_prefix,
            assistant_command: assistant_command.into(),
            coordination_assets,
        }
    }

    /// Create `n` new workers, assigning the next `n` available names and
    /// ids in one pass (spec §4.9).
    pub async fn create(&self, n: usize, container_ref: Option<ContainerRef>) -> Result<Vec<Worker>, LifecycleError> {
        let mut guard = self.index.lock().await;
        let used_names = guard.names();
        let names = self
            .names
            .next_available(used_names.iter().map(String::as_str), n);
        let start_id = guard.max_id().map(|id| id.0 + 1).unwrap_or(1);

        let base = self.git.base_branch(&self.repo_path).await?;
        let mut created = Vec::with_capacity(names.len());

        for (k, name) in names.into_iter().enumerate() {
            let id = WorkerId(start_id + k as u64);
            let branch = format!("{}-{name}", self.worker_prefix);
            let worktree_path = orchestra_adapters::gitops::worktree_path_for(
                &self.repo_path,
                &self.worktree_subdir,
                &self.worker_prefix,
                &name,
            );

            self.git
                .create_worktree(&self.repo_path, &worktree_path, &branch, &base)
                .await?;

            if let Some(assets) = &self.coordination_assets {
                if let Err(e) = self.platform.copy_dir_recursive(&assets.source_dir, &worktree_path).await {
                    tracing::warn!(worker = %name, error = %e, "failed to copy coordination assets into worktree");
                }
            }

            let session_id = SessionId::new(self.id_gen.next());
            let metadata = orchestra_engine_metadata(&id, &name, &session_id, &branch, &worktree_path, &self.repo_path, &container_ref);
            self.worktree_store
                .save(&worktree_path, &metadata)
                .await
                .map_err(|e| LifecycleError::Metadata(e.to_string()))?;

            let (session_name, is_new) = self
                .terminal
                .create_detached(session_id.as_str(), &worktree_path, &self.assistant_command, &[])
                .await
                .map_err(|e| LifecycleError::Session(e.to_string()))?;

            let worker = Worker {
                id,
                session_id,
                name: name.clone(),
                branch,
                repo_path: self.repo_path.clone(),
                worktree_path,
                status: orchestra_core::WorkerStatus::Idle,
                pending_approval: None,
                todos: Vec::new(),
                diff_stats: orchestra_core::DiffStats::default(),
                last_interaction_time: 0,
                container_ref: container_ref.clone(),
                session_started: is_new,
                task_file: None,
            };

            guard.insert(worker.clone());
            self.bus.emit(Event::WorkerCreated { worker: worker.clone() });
            self.bus.emit(Event::WorkerTerminalCreated {
                worker: worker.clone(),
                is_new,
            });
            tracing::info!(worker = %worker.name, session = %session_name, "worker created");
            created.push(worker);
        }

        Ok(created)
    }

    /// Rename a worker: destroy and recreate its worktree under the new
    /// branch name, rather than attempting an in-place Git rename of a
    /// worktree directory (spec §4.9 explicitly allows destroy-then-recreate).
    pub async fn rename(&self, id: WorkerId, new_name: String) -> Result<Worker, LifecycleError> {
        let mut guard = self.index.lock().await;
        let previous = guard.get(id).cloned().ok_or(LifecycleError::NotFound(id))?;
        let previous_name = previous.name.clone();

        let new_branch = format!("{}-{new_name}", self.worker_prefix);
        let new_worktree_path = orchestra_adapters::gitops::worktree_path_for(
            &self.repo_path,
            &self.worktree_subdir,
            &self.worker_prefix,
            &new_name,
        );

        self.git.rename_branch(&self.repo_path, &previous.branch, &new_branch).await?;
        self.git
            .remove_worktree(&self.repo_path, &previous.worktree_path)
            .await?;
        self.git
            .create_worktree(&self.repo_path, &new_worktree_path, &new_branch, &new_branch)
            .await?;

        if let Some(assets) = &self.coordination_assets {
            if let Err(e) = self.platform.copy_dir_recursive(&assets.source_dir, &new_worktree_path).await {
                tracing::warn!(worker = %new_name, error = %e, "failed to copy coordination assets after rename");
            }
        }

        let updated = previous.with_name_and_branch(new_name, new_branch, new_worktree_path.clone());
        let metadata = orchestra_engine_metadata(
            &updated.id,
            &updated.name,
            &updated.session_id,
            &updated.branch,
            &new_worktree_path,
            &self.repo_path,
            &updated.container_ref,
        );
        self.worktree_store
            .save(&new_worktree_path, &metadata)
            .await
            .map_err(|e| LifecycleError::Metadata(e.to_string()))?;

        guard.insert(updated.clone());
        self.bus.emit(Event::WorkerRenamed {
            worker: updated.clone(),
            previous_name,
        });
        Ok(updated)
    }

    /// Delete a worker: kill its session, tear down its worktree and
    /// branch, and drop it from the index (spec §4.9).
    pub async fn delete(&self, id: WorkerId) -> Result<(), LifecycleError> {
        let mut guard = self.index.lock().await;
        let worker = guard.get(id).cloned().ok_or(LifecycleError::NotFound(id))?;

        let session_name = self.terminal.session_name(worker.session_id.as_str());
        if let Err(e) = self.terminal.kill(&session_name).await {
            tracing::warn!(worker = %worker.name, error = %e, "failed to kill terminal session during delete");
        }

        self.git.remove_worktree(&self.repo_path, &worker.worktree_path).await?;
        if let Err(e) = self.git.delete_branch(&self.repo_path, &worker.branch).await {
            tracing::warn!(worker = %worker.name, error = %e, "failed to delete branch during delete");
        }

        guard.remove(id);
        drop(guard);

        self.bus.emit(Event::WorkerDeleted { worker_id: id });
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn orchestra_engine_metadata(
    id: &WorkerId,
    name: &str,
    session_id: &SessionId,
    branch: &str,
    worktree_path: &PathBuf,
    repo_path: &PathBuf,
    container_ref: &Option<ContainerRef>,
) -> crate::worktree_store::AgentMetadata {
    crate::worktree_store::AgentMetadata {
        id: id.0,
        name: name.to_string(),
        session_id: session_id.as_str().to_string(),
        branch: branch.to_string(),
        worktree_path: worktree_path.clone(),
        repo_path: repo_path.clone(),
        task_file: None,
        container_config_name: container_ref.as_ref().map(|c| c.0.clone()),
        session_started: true,
    }
}

#[cfg(test)]
#[path = "worker_lifecycle_tests.rs"]
mod tests;
