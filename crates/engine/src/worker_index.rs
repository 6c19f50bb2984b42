// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-memory worker index the reconciliation engine and worker
//! lifecycle share: a map of [`WorkerId`] to the current `Worker` value and
//! its state machine. The engine locks it for the duration of one
//! reconciliation transaction; `WorkerLifecycle` locks it for the duration
//! of a create/rename/delete (spec §4.8, §4.9, §5).

use orchestra_core::worker::{new_worker_state_machine, WorkerEvent};
use orchestra_core::{StateMachine, Worker, WorkerId, WorkerStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct WorkerEntry {
    pub worker: Worker,
    pub machine: StateMachine<WorkerStatus, WorkerEvent>,
}

/// The update-mutex-guarded worker map (spec §4.8's "single lock" boundary).
pub type SharedWorkerIndex = Arc<Mutex<WorkerIndex>>;

#[derive(Default)]
pub struct WorkerIndex {
    entries: HashMap<WorkerId, WorkerEntry>,
}

impl WorkerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedWorkerIndex {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Insert a worker, synchronizing its state machine to the worker's
    /// already-known status (e.g. loaded from disk on restart) rather than
    /// replaying the transition history that produced it.
    pub fn insert(&mut self, worker: Worker) {
        let mut machine = new_worker_state_machine();
        machine.force_state(worker.status);
        let id = worker.id;
        self.entries.insert(id, WorkerEntry { worker, machine });
    }

    pub fn remove(&mut self, id: WorkerId) -> Option<Worker> {
        self.entries.remove(&id).map(|e| e.worker)
    }

    pub fn get(&self, id: WorkerId) -> Option<&Worker> {
        self.entries.get(&id).map(|e| &e.worker)
    }

    pub fn entry_mut(&mut self, id: WorkerId) -> Option<&mut WorkerEntry> {
        self.entries.get_mut(&id)
    }

    pub fn ids(&self) -> Vec<WorkerId> {
        self.entries.keys().copied().collect()
    }

    pub fn workers(&self) -> Vec<Worker> {
        self.entries.values().map(|e| e.worker.clone()).collect()
    }

    pub fn max_id(&self) -> Option<WorkerId> {
        self.entries.keys().copied().max()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.values().map(|e| e.worker.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "worker_index_tests.rs"]
mod tests;
