// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::worker::{SessionId, WorkerStatus};
use std::path::PathBuf;

fn sample_worker() -> Worker {
    Worker {
        id: WorkerId(1),
        session_id: SessionId::new("abc123"),
        name: "alpha".to_string(),
        branch: "claude-alpha".to_string(),
        repo_path: PathBuf::from("/repo"),
        worktree_path: PathBuf::from("/repo/.worktrees/claude-alpha"),
        status: WorkerStatus::Idle,
        pending_approval: None,
        todos: Vec::new(),
        diff_stats: DiffStats::default(),
        last_interaction_time: 0,
        container_ref: None,
        session_started: false,
        task_file: None,
    }
}

#[test]
fn worker_created_serializes_with_tag() {
    let event = Event::WorkerCreated {
        worker: sample_worker(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "worker:created");
    assert_eq!(json["worker"]["name"], "alpha");
}

#[test]
fn kind_matches_serde_tag_for_every_variant() {
    let events = vec![
        Event::WorkerCreated {
            worker: sample_worker(),
        },
        Event::WorkerDeleted {
            worker_id: WorkerId(1),
        },
        Event::ApprovalPending {
            approval: Approval {
                worker_id: WorkerId(1),
                description: "Bash: rm -rf".to_string(),
                timestamp: 42,
            },
        },
        Event::ApprovalResolved {
            worker_id: WorkerId(1),
        },
        Event::ErrorRecoverable {
            source: ErrorSource::FileWatcher,
            code: ErrorCode::new("POLLING_FAILURE"),
            message: "watch failed".to_string(),
            context: HashMap::new(),
            recovery_action: Some("falling back to polling".to_string()),
        },
        Event::OperationStarted {
            operation_id: "op-1".to_string(),
            op_type: OperationKind::Create,
        },
    ];
    for event in events {
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
    }
}

#[test]
fn error_events_are_flagged_and_others_are_not() {
    let recoverable = Event::ErrorRecoverable {
        source: ErrorSource::GitOps,
        code: ErrorCode::new("GIT_TIMEOUT"),
        message: "timed out".to_string(),
        context: HashMap::new(),
        recovery_action: None,
    };
    assert!(recoverable.is_error());

    let created = Event::WorkerCreated {
        worker: sample_worker(),
    };
    assert!(!created.is_error());
}

#[test]
fn error_recoverable_roundtrips_through_json() {
    let mut context = HashMap::new();
    context.insert("worker_id".to_string(), "1".to_string());
    let event = Event::ErrorRecoverable {
        source: ErrorSource::ReconciliationEngine,
        code: ErrorCode::new("WORKTREE_FAILURE"),
        message: "could not stat worktree".to_string(),
        context,
        recovery_action: None,
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(event, back);
}

#[test]
fn operation_failed_carries_message_and_type() {
    let event = Event::OperationFailed {
        operation_id: "op-7".to_string(),
        op_type: OperationKind::Delete,
        message: "branch exists".to_string(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "operation:failed");
    assert_eq!(json["op_type"], "delete");
    assert_eq!(json["message"], "branch exists");
}
