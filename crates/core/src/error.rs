// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by the reconciliation engine.
//!
//! Each variant carries a stable `code()` (used in `error:recoverable` /
//! `error:fatal` event payloads) and a `recoverable()` flag. Adapter crates
//! define their own narrower error types (`SessionError`, `GitError`, ...)
//! and convert into this taxonomy at the boundary where the engine needs a
//! uniform type to put on the event bus.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("worker metadata invalid: {0}")]
    WorkerMetadataInvalid(String),

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("session failure: {0}")]
    SessionFailure(String),

    #[error("multiplexer unavailable: {0}")]
    MultiplexerUnavailable(String),

    #[error("container failure: {0}")]
    ContainerFailure(String),

    #[error("container config invalid: {0}")]
    ContainerConfigInvalid(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("worktree failure: {0}")]
    WorktreeFailure(String),

    #[error("git command failed: {0}")]
    GitCommandFailure(String),

    #[error("git command timed out: {0}")]
    GitTimeout(String),

    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("polling failure: {0}")]
    PollingFailure(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl CoreError {
    /// Stable machine-readable code for this error kind, as carried on
    /// `error:recoverable`/`error:fatal` event payloads.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::WorkerNotFound(_) => "WORKER_NOT_FOUND",
            CoreError::WorkerMetadataInvalid(_) => "WORKER_METADATA_INVALID",
            CoreError::BranchExists(_) => "BRANCH_EXISTS",
            CoreError::SessionFailure(_) => "SESSION_FAILURE",
            CoreError::MultiplexerUnavailable(_) => "MULTIPLEXER_UNAVAILABLE",
            CoreError::ContainerFailure(_) => "CONTAINER_FAILURE",
            CoreError::ContainerConfigInvalid(_) => "CONTAINER_CONFIG_INVALID",
            CoreError::ContainerNotFound(_) => "CONTAINER_NOT_FOUND",
            CoreError::WorktreeFailure(_) => "WORKTREE_FAILURE",
            CoreError::GitCommandFailure(_) => "GIT_COMMAND_FAILURE",
            CoreError::GitTimeout(_) => "GIT_TIMEOUT",
            CoreError::ConfigInvalid(_) => "CONFIG_INVALID",
            CoreError::Validation(_) => "VALIDATION",
            CoreError::PollingFailure(_) => "POLLING_FAILURE",
            CoreError::Cancelled => "CANCELLED",
            CoreError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
        }
    }

    /// Whether this error kind is recoverable (the engine continues running)
    /// or fatal (the engine stops polling and is considered degraded).
    pub fn recoverable(&self) -> bool {
        !matches!(
            self,
            CoreError::BranchExists(_) | CoreError::MultiplexerUnavailable(_)
        )
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
