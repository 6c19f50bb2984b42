// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! orchestra-engine: the state-reconciliation engine that keeps `Worker`
//! values in sync with their on-disk ground truth.
//!
//! Components (spec §4): [`EventBus`] is the typed pub/sub bus everything
//! else publishes to; [`FileWatcher`] bounds staleness with a native-watch
//! plus backup-poll hybrid; [`WorktreeStore`] is the durable
//! `.orchestra/agent.json` reader/writer; [`StatusParser`] turns a hook
//! status file into a [`orchestra_core::WorkerStatus`]; [`WorkerIndex`] is
//! the shared, mutex-guarded worker map; [`ReconciliationEngine`] runs the
//! status/todos/diff pollers against it; [`WorkerLifecycle`] is the only
//! component permitted to create, rename, or delete a worker.

pub mod event_bus;
pub mod file_watcher;
pub mod reconciliation;
pub mod status_parser;
pub mod worker_index;
pub mod worker_lifecycle;
pub mod worktree_store;

pub use event_bus::EventBus;
pub use file_watcher::{FileWatcher, FileWatcherConfig, WatchTrigger};
pub use reconciliation::{PollingConfig, ReconciliationEngine, TodoSource};
pub use status_parser::{ParsedStatus, StatusParser};
pub use worker_index::{SharedWorkerIndex, WorkerEntry, WorkerIndex};
pub use worker_lifecycle::{CoordinationAssets, LifecycleError, WorkerLifecycle};
pub use worktree_store::{AgentMetadata, WorktreeStore, WorktreeStoreError};
