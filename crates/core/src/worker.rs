// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Worker` value and the concrete state machine configuration for
//! worker lifecycle transitions (spec §3, §4.1).

use crate::state_machine::{StateMachine, Transition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

crate::define_id! {
    /// Opaque random session identifier, stable across renames.
    ///
    /// Distinct from [`WorkerId`], which is a small process-lifetime integer.
    /// `session_id` is the durable identity: it survives worker renames and
    /// is what ties a `Worker` to its terminal session name.
    pub struct SessionId;
}

/// Monotonically assigned small integer, unique within process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a worker, matching the state machine's states one-to-one
/// (spec invariant: `worker.status` always equals the state machine state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerStatus {
    Idle,
    Working,
    WaitingInput,
    WaitingApproval,
    Stopped,
    Error,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Working => "working",
            WorkerStatus::WaitingInput => "waiting-input",
            WorkerStatus::WaitingApproval => "waiting-approval",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Events accepted by the worker state machine (spec §4.1 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerEvent {
    Start,
    Complete,
    RequestInput,
    RequestApproval,
    ReceiveInput,
    Approve,
    Reject,
    Error,
    Stop,
    Recover,
}

impl std::fmt::Display for WorkerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Build the transition table from spec §4.1.
pub fn worker_transitions() -> HashMap<WorkerEvent, Transition<WorkerStatus>> {
    use WorkerStatus::*;
    let mut t = HashMap::new();
    t.insert(
        WorkerEvent::Start,
        Transition {
            from: vec![Idle, Stopped, Error],
            to: Working,
        },
    );
    t.insert(
        WorkerEvent::Complete,
        Transition {
            from: vec![Working],
            to: Idle,
        },
    );
    t.insert(
        WorkerEvent::RequestInput,
        Transition {
            from: vec![Working],
            to: WaitingInput,
        },
    );
    t.insert(
        WorkerEvent::RequestApproval,
        Transition {
            from: vec![Working],
            to: WaitingApproval,
        },
    );
    t.insert(
        WorkerEvent::ReceiveInput,
        Transition {
            from: vec![WaitingInput],
            to: Working,
        },
    );
    t.insert(
        WorkerEvent::Approve,
        Transition {
            from: vec![WaitingApproval],
            to: Working,
        },
    );
    t.insert(
        WorkerEvent::Reject,
        Transition {
            from: vec![WaitingApproval],
            to: Idle,
        },
    );
    t.insert(
        WorkerEvent::Error,
        Transition {
            from: vec![Working, WaitingInput, WaitingApproval],
            to: Error,
        },
    );
    t.insert(
        WorkerEvent::Stop,
        Transition {
            from: vec![Working, WaitingInput, WaitingApproval],
            to: Stopped,
        },
    );
    t.insert(
        WorkerEvent::Recover,
        Transition {
            from: vec![Error],
            to: Idle,
        },
    );
    t
}

/// Construct a fresh state machine for a newly created worker (starts idle).
pub fn new_worker_state_machine() -> StateMachine<WorkerStatus, WorkerEvent> {
    StateMachine::new(WorkerStatus::Idle, worker_transitions())
}

/// Compute the symbolic event for a proposed status change, per spec §4.1:
///
/// `n==working ∧ c==waiting-approval → APPROVE`, `n==idle ∧ c==waiting-approval
/// → REJECT`, otherwise fall back to `START`/`COMPLETE`/`STOP`/`ERROR`/
/// `REQUEST_*`. Same state yields no event.
pub fn status_delta_to_event(current: WorkerStatus, proposed: WorkerStatus) -> Option<WorkerEvent> {
    use WorkerStatus::*;
    if current == proposed {
        return None;
    }
    Some(match (current, proposed) {
        (WaitingApproval, Working) => WorkerEvent::Approve,
        (WaitingApproval, Idle) => WorkerEvent::Reject,
        (WaitingInput, Working) => WorkerEvent::ReceiveInput,
        (_, Working) => WorkerEvent::Start,
        (Working, Idle) => WorkerEvent::Complete,
        (_, WaitingInput) => WorkerEvent::RequestInput,
        (_, WaitingApproval) => WorkerEvent::RequestApproval,
        (_, Stopped) => WorkerEvent::Stop,
        (_, Error) => WorkerEvent::Error,
        (_, Idle) => WorkerEvent::Recover,
    })
}

/// Status of a single todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// A single entry in a worker's todo list, as reported by the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub status: TodoStatus,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_form: Option<String>,
}

/// Diff statistics for a worktree relative to its base branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub files_changed: u32,
    pub insertions: u32,
    pub deletions: u32,
}

/// Symbolic reference to a container configuration. `"unisolated"` denotes
/// no isolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRef(pub String);

impl ContainerRef {
    pub const UNISOLATED: &'static str = "unisolated";

    pub fn unisolated() -> Self {
        Self(Self::UNISOLATED.to_string())
    }

    pub fn is_unisolated(&self) -> bool {
        self.0 == Self::UNISOLATED
    }
}

impl std::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The central entity: one active coding-assistant worker.
///
/// Immutable — every mutation produces a new `Worker` value via the
/// `with_*` builder methods rather than mutating in place. Readers may hold
/// a cloned `Worker` without fear of it changing underneath them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub session_id: SessionId,
    pub name: String,
    pub branch: String,
    pub repo_path: PathBuf,
    pub worktree_path: PathBuf,
    pub status: WorkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_approval: Option<String>,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    #[serde(default)]
    pub diff_stats: DiffStats,
    pub last_interaction_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_ref: Option<ContainerRef>,
    #[serde(default)]
    pub session_started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_file: Option<PathBuf>,
}

impl Worker {
    /// Validate the `pending_approval ⇔ status == waiting-approval` invariant.
    pub fn invariants_hold(&self) -> bool {
        match &self.pending_approval {
            Some(s) => !s.is_empty() && self.status == WorkerStatus::WaitingApproval,
            None => self.status != WorkerStatus::WaitingApproval,
        }
    }

    /// Build a successor value with a new status and pending-approval
    /// description, stamping `last_interaction_time`. Does not itself
    /// validate the transition — callers run it through a `StateMachine`
    /// first and only call this once the transition is known to be valid.
    pub fn with_status(
        &self,
        status: WorkerStatus,
        pending_approval: Option<String>,
        now_epoch_ms: u64,
    ) -> Worker {
        Worker {
            status,
            pending_approval,
            last_interaction_time: now_epoch_ms,
            ..self.clone()
        }
    }

    pub fn with_diff_stats(&self, diff_stats: DiffStats) -> Worker {
        Worker {
            diff_stats,
            ..self.clone()
        }
    }

    pub fn with_todos(&self, todos: Vec<TodoItem>) -> Worker {
        Worker {
            todos,
            ..self.clone()
        }
    }

    pub fn with_name_and_branch(&self, name: String, branch: String, worktree_path: PathBuf) -> Worker {
        Worker {
            name,
            branch,
            worktree_path,
            ..self.clone()
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
