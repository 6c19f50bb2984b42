// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types published on the event bus (spec §6).
//!
//! Serializes with `{"type": "event:name", ...fields}`, following the same
//! shape the hook/status-file payloads use, so a dashboard subscriber can
//! treat bus events and on-disk payloads uniformly if it wants to log both.

use crate::worker::{DiffStats, TodoItem, Worker, WorkerId, WorkerStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which component raised an `error:*` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    ReconciliationEngine,
    WorkerLifecycle,
    FileWatcher,
    GitOps,
    StatusParser,
    TerminalSessionManager,
    WorktreeStore,
    EventBus,
}

/// Stable machine-readable error code, e.g. `INVALID_STATE_TRANSITION`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode(pub String);

impl ErrorCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pending approval gate surfaced to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub worker_id: WorkerId,
    pub description: String,
    pub timestamp: u64,
}

/// Kind of long-running lifecycle command an `operation:*` event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Rename,
    Delete,
    StartAssistant,
    SendToWorker,
    ChangeContainer,
    Cleanup,
}

/// Events published on the bus (spec §6's event catalog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "worker:created")]
    WorkerCreated { worker: Worker },

    #[serde(rename = "worker:deleted")]
    WorkerDeleted { worker_id: WorkerId },

    #[serde(rename = "worker:renamed")]
    WorkerRenamed {
        worker: Worker,
        previous_name: String,
    },

    #[serde(rename = "worker:status_changed")]
    WorkerStatusChanged {
        worker: Worker,
        previous_status: WorkerStatus,
    },

    #[serde(rename = "worker:todos_changed")]
    WorkerTodosChanged {
        worker: Worker,
        previous_todos: Vec<TodoItem>,
    },

    #[serde(rename = "worker:diff_stats_changed")]
    WorkerDiffStatsChanged {
        worker: Worker,
        previous_diff_stats: DiffStats,
    },

    #[serde(rename = "worker:terminal_created")]
    WorkerTerminalCreated { worker: Worker, is_new: bool },

    #[serde(rename = "worker:terminal_closed")]
    WorkerTerminalClosed { worker_id: WorkerId },

    #[serde(rename = "approval:pending")]
    ApprovalPending { approval: Approval },

    #[serde(rename = "approval:resolved")]
    ApprovalResolved { worker_id: WorkerId },

    #[serde(rename = "container:created")]
    ContainerCreated {
        worker_id: WorkerId,
        container_ref: String,
    },

    #[serde(rename = "container:removed")]
    ContainerRemoved {
        worker_id: WorkerId,
        container_ref: String,
    },

    #[serde(rename = "container:state_changed")]
    ContainerStateChanged {
        worker_id: WorkerId,
        container_ref: String,
        state: String,
    },

    #[serde(rename = "error:recoverable")]
    ErrorRecoverable {
        source: ErrorSource,
        code: ErrorCode,
        message: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        context: HashMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recovery_action: Option<String>,
    },

    #[serde(rename = "error:fatal")]
    ErrorFatal {
        source: ErrorSource,
        code: ErrorCode,
        message: String,
        user_message: String,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        context: HashMap<String, String>,
    },

    #[serde(rename = "operation:started")]
    OperationStarted {
        operation_id: String,
        op_type: OperationKind,
    },

    #[serde(rename = "operation:progress")]
    OperationProgress {
        operation_id: String,
        op_type: OperationKind,
        message: String,
    },

    #[serde(rename = "operation:completed")]
    OperationCompleted {
        operation_id: String,
        op_type: OperationKind,
    },

    #[serde(rename = "operation:failed")]
    OperationFailed {
        operation_id: String,
        op_type: OperationKind,
        message: String,
    },
}

impl Event {
    /// The bus kind string this event carries (used for subscriber
    /// registration keys and logging).
    pub fn kind(&self) -> &'static str {
        match self {
            Event::WorkerCreated { .. } => "worker:created",
            Event::WorkerDeleted { .. } => "worker:deleted",
            Event::WorkerRenamed { .. } => "worker:renamed",
            Event::WorkerStatusChanged { .. } => "worker:status_changed",
            Event::WorkerTodosChanged { .. } => "worker:todos_changed",
            Event::WorkerDiffStatsChanged { .. } => "worker:diff_stats_changed",
            Event::WorkerTerminalCreated { .. } => "worker:terminal_created",
            Event::WorkerTerminalClosed { .. } => "worker:terminal_closed",
            Event::ApprovalPending { .. } => "approval:pending",
            Event::ApprovalResolved { .. } => "approval:resolved",
            Event::ContainerCreated { .. } => "container:created",
            Event::ContainerRemoved { .. } => "container:removed",
            Event::ContainerStateChanged { .. } => "container:state_changed",
            Event::ErrorRecoverable { .. } => "error:recoverable",
            Event::ErrorFatal { .. } => "error:fatal",
            Event::OperationStarted { .. } => "operation:started",
            Event::OperationProgress { .. } => "operation:progress",
            Event::OperationCompleted { .. } => "operation:completed",
            Event::OperationFailed { .. } => "operation:failed",
        }
    }

    /// Whether this is itself an `error:*` event (the bus does not enqueue a
    /// synthetic `error:recoverable` in response to a failing handler for
    /// one of these, to avoid infinite loops).
    pub fn is_error(&self) -> bool {
        matches!(self, Event::ErrorRecoverable { .. } | Event::ErrorFatal { .. })
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
