// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `WorktreeStore`: the directory of worktrees is the durable source of
//! truth for worker identity (spec §4.4, §9). Each worktree carries a
//! `.orchestra/agent.json` the store reads on startup and writes
//! atomically on every change — there is no separate index file to drift
//! out of sync with the filesystem.

use orchestra_adapters::platform::Platform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const METADATA_RELATIVE_PATH: &str = ".orchestra/agent.json";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorktreeStoreError {
    #[error("metadata missing at {0}")]
    Missing(String),
    #[error("metadata invalid at {path}: {message}")]
    Invalid { path: String, message: String },
    #[error("io error: {0}")]
    Io(String),
}

/// On-disk schema of `.orchestra/agent.json` (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub id: u64,
    pub name: String,
    pub session_id: String,
    pub branch: String,
    pub worktree_path: PathBuf,
    pub repo_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_config_name: Option<String>,
    #[serde(default)]
    pub session_started: bool,
}

/// Reads, validates, and atomically persists per-worktree metadata.
pub struct WorktreeStore<P: Platform> {
    platform: P,
    worker_prefix: String,
}

impl<P: Platform> WorktreeStore<P> {
    pub fn new(platform: P, worker_prefix: impl Into<String>) -> Self {
        Self {
            platform,
            worker_prefix: worker_prefix.into(),
        }
    }

    fn metadata_path(worktree_path: &Path) -> PathBuf {
        worktree_path.join(METADATA_RELATIVE_PATH)
    }

    pub async fn load(&self, worktree_path: &Path) -> Result<AgentMetadata, WorktreeStoreError> {
        let path = Self::metadata_path(worktree_path);
        if !self.platform.exists(&path) {
            return Err(WorktreeStoreError::Missing(path.display().to_string()));
        }
        let raw = self
            .platform
            .read(&path)
            .await
            .map_err(|e| WorktreeStoreError::Io(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| WorktreeStoreError::Invalid {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub async fn save(
        &self,
        worktree_path: &Path,
        metadata: &AgentMetadata,
    ) -> Result<(), WorktreeStoreError> {
        let path = Self::metadata_path(worktree_path);
        if let Some(parent) = path.parent() {
            self.platform
                .mkdir(parent, true)
                .await
                .map_err(|e| WorktreeStoreError::Io(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(metadata).map_err(|e| WorktreeStoreError::Invalid {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.platform
            .atomic_write(&path, &raw)
            .await
            .map_err(|e| WorktreeStoreError::Io(e.to_string()))
    }

    /// Scan `repo_path`'s worktree subdirectory, keeping only directories
    /// whose name begins with the worker prefix, and reading and validating
    /// each one's metadata. Invalid or missing metadata is skipped with a
    /// warning rather than failing the whole scan — one corrupt worktree
    /// shouldn't hide every other worker.
    pub async fn scan(&self, worktrees_root: &Path) -> Vec<AgentMetadata> {
        let entries = match self.platform.read_dir(worktrees_root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %worktrees_root.display(), error = %e, "failed to scan worktrees directory");
                return Vec::new();
            }
        };

        let prefix = format!("{}-", self.worker_prefix);
        let mut out = Vec::new();
        for entry in entries {
            let matches_prefix = entry
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix));
            if !matches_prefix {
                continue;
            }
            match self.load(&entry).await {
                Ok(metadata) => out.push(metadata),
                Err(WorktreeStoreError::Missing(_)) => {
                    tracing::debug!(path = %entry.display(), "no agent metadata in directory, skipping");
                }
                Err(e) => {
                    tracing::warn!(path = %entry.display(), error = %e, "invalid worker metadata, skipping");
                }
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "worktree_store_tests.rs"]
mod tests;
