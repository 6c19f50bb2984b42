// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GitOps`: every Git invocation the engine needs, wrapped with timeouts
//! and a bounded retry policy for idempotent reads (spec §4.6).
//!
//! Destructive operations (`create_worktree`, `remove_worktree`,
//! `rename_branch`, `delete_branch`, `commit`) never retry — a failed
//! mutation is surfaced to the caller as-is. Read operations
//! (`current_branch`, `base_branch`, `diff_stats`, `changed_files`) retry
//! up to 3 times with exponential backoff (500ms, 1s, 2s) since a
//! transient Git failure there should not derail a polling tick.

use crate::subprocess::{self, GIT_READ_TIMEOUT, GIT_WORKTREE_TIMEOUT};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_MIN_BACKOFF: Duration = Duration::from_millis(500);
const RETRY_FACTOR: u32 = 2;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GitOpsError {
    #[error("git command failed: {message}")]
    CommandFailed { message: String, code: String },
    #[error("git command timed out: {0}")]
    Timeout(String),
    #[error("not a git repository: {0}")]
    NotARepo(String),
}

/// Lines added/removed, as reported by `git diff --shortstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffStats {
    pub files_changed: u32,
    pub insertions: u32,
    pub deletions: u32,
}

/// Git operations the engine needs, backed by the `git` CLI via subprocess.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitOps;

impl GitOps {
    pub fn new() -> Self {
        Self
    }

    pub async fn is_repo(&self, path: &Path) -> bool {
        self.run_read(path, &["rev-parse", "--is-inside-work-tree"])
            .await
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    pub async fn current_branch(&self, path: &Path) -> Result<String, GitOpsError> {
        self.retrying(path, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
    }

    /// Resolve the base branch: prefer `main`, fall back to `master`, fall
    /// back to `HEAD~1` when neither exists (spec §4.6).
    pub async fn base_branch(&self, path: &Path) -> Result<String, GitOpsError> {
        for candidate in ["main", "master"] {
            let exists = self
                .retrying(
                    path,
                    &["show-ref", "--verify", &format!("refs/heads/{candidate}")],
                )
                .await
                .is_ok();
            if exists {
                return Ok(candidate.to_string());
            }
        }
        Ok("HEAD~1".to_string())
    }

    pub async fn diff_stats(&self, path: &Path, base: &str) -> Result<DiffStats, GitOpsError> {
        let raw = self
            .retrying(path, &["diff", "--shortstat", base])
            .await?;
        Ok(parse_shortstat(&raw))
    }

    pub async fn changed_files(&self, path: &Path, base: &str) -> Result<Vec<String>, GitOpsError> {
        let raw = self
            .retrying(path, &["diff", "--name-only", base])
            .await?;
        Ok(raw.lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
    }

    pub async fn create_worktree(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        branch: &str,
        base: &str,
    ) -> Result<(), GitOpsError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(repo_path).args([
            "worktree",
            "add",
            "-B",
            branch,
            &worktree_path.display().to_string(),
            base,
        ]);
        self.run_once(cmd, GIT_WORKTREE_TIMEOUT, "git worktree add")
            .await
            .map(|_| ())
    }

    pub async fn remove_worktree(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
    ) -> Result<(), GitOpsError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(repo_path).args([
            "worktree",
            "remove",
            "--force",
            &worktree_path.display().to_string(),
        ]);
        if self
            .run_once(cmd, GIT_WORKTREE_TIMEOUT, "git worktree remove")
            .await
            .is_err()
        {
            // The worktree directory may already be gone (e.g. a prior
            // partial cleanup); fall back to a plain directory removal so
            // `prune` has something consistent to clean up after.
            let _ = tokio::fs::remove_dir_all(worktree_path).await;
        }
        let mut prune = Command::new("git");
        prune.current_dir(repo_path).args(["worktree", "prune"]);
        self.run_once(prune, GIT_WORKTREE_TIMEOUT, "git worktree prune")
            .await
            .map(|_| ())
    }

    pub async fn rename_branch(
        &self,
        repo_path: &Path,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), GitOpsError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(repo_path)
            .args(["branch", "-m", old_name, new_name]);
        self.run_once(cmd, GIT_READ_TIMEOUT, "git branch -m")
            .await
            .map(|_| ())
    }

    pub async fn delete_branch(&self, repo_path: &Path, branch: &str) -> Result<(), GitOpsError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(repo_path).args(["branch", "-D", branch]);
        self.run_once(cmd, GIT_READ_TIMEOUT, "git branch -D")
            .await
            .map(|_| ())
    }

    pub async fn init_repo(&self, path: &Path) -> Result<(), GitOpsError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(path).arg("init");
        self.run_once(cmd, GIT_READ_TIMEOUT, "git init").await.map(|_| ())
    }

    pub async fn stage_all(&self, path: &Path) -> Result<(), GitOpsError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(path).args(["add", "-A"]);
        self.run_once(cmd, GIT_READ_TIMEOUT, "git add -A").await.map(|_| ())
    }

    pub async fn commit(&self, path: &Path, message: &str) -> Result<(), GitOpsError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(path).args(["commit", "-m", message]);
        self.run_once(cmd, GIT_READ_TIMEOUT, "git commit").await.map(|_| ())
    }

    async fn run_read(&self, path: &Path, args: &[&str]) -> Result<String, GitOpsError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(path).args(args);
        self.run_once(cmd, GIT_READ_TIMEOUT, "git").await
    }

    async fn retrying(&self, path: &Path, args: &[&str]) -> Result<String, GitOpsError> {
        let mut backoff = RETRY_MIN_BACKOFF;
        let mut last_err = None;
        for attempt in 0..RETRY_ATTEMPTS {
            match self.run_read(path, args).await {
                Ok(out) => return Ok(out),
                Err(e) => {
                    last_err = Some(e);
                    if attempt + 1 < RETRY_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff *= RETRY_FACTOR;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(GitOpsError::CommandFailed {
            message: "exhausted retries".to_string(),
            code: "retry_exhausted".to_string(),
        }))
    }

    async fn run_once(
        &self,
        cmd: Command,
        timeout: Duration,
        description: &str,
    ) -> Result<String, GitOpsError> {
        let output = subprocess::run_with_timeout(cmd, timeout, description)
            .await
            .map_err(|msg| {
                if msg.contains("timed out") {
                    GitOpsError::Timeout(msg)
                } else {
                    GitOpsError::CommandFailed {
                        message: msg,
                        code: "exec_failed".to_string(),
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GitOpsError::CommandFailed {
                message: stderr,
                code: output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Parse a `git diff --shortstat` summary line, e.g.
/// `" 3 files changed, 12 insertions(+), 4 deletions(-)"`.
fn parse_shortstat(raw: &str) -> DiffStats {
    let mut stats = DiffStats::default();
    for part in raw.split(',') {
        let part = part.trim();
        let Some((number, _)) = part.split_once(' ') else {
            continue;
        };
        let Ok(n) = number.parse::<u32>() else {
            continue;
        };
        if part.contains("file") {
            stats.files_changed = n;
        } else if part.contains("insertion") {
            stats.insertions = n;
        } else if part.contains("deletion") {
            stats.deletions = n;
        }
    }
    stats
}

/// Build the path a worktree named `name` should live at: a directory
/// named `<prefix>-<name>` under `<repo_path>/<worktree_subdir>/` (spec
/// §3 — worktrees live under a fixed subdirectory of the repo, not as a
/// sibling of it, so `FileWatcher`/`WorktreeStore::scan` watch one stable
/// root).
pub fn worktree_path_for(repo_path: &Path, worktree_subdir: &str, prefix: &str, name: &str) -> PathBuf {
    repo_path.join(worktree_subdir).join(format!("{prefix}-{name}"))
}

#[cfg(test)]
#[path = "gitops_tests.rs"]
mod tests;
