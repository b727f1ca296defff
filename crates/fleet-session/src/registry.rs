// SPDX-License-Identifier: MIT

//! `ProcessRegistry`: the collaborator a `Session` looks a `Process` up
//! through instead of holding a strong reference to it (§9 weak-reference
//! redesign). The supervisor remains the sole owner.

use fleet_core::ProcessId;
use fleet_process::ProcessSupervisor;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub trait ProcessRegistry: Send + Sync {
    fn insert(&self, id: ProcessId, supervisor: Arc<ProcessSupervisor>);
    fn get(&self, id: ProcessId) -> Option<Arc<ProcessSupervisor>>;
    fn remove(&self, id: ProcessId) -> Option<Arc<ProcessSupervisor>>;
}

#[derive(Default)]
pub struct InMemoryProcessRegistry {
    processes: RwLock<HashMap<ProcessId, Arc<ProcessSupervisor>>>,
}

impl InMemoryProcessRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl ProcessRegistry for InMemoryProcessRegistry {
    fn insert(&self, id: ProcessId, supervisor: Arc<ProcessSupervisor>) {
        self.processes.write().insert(id, supervisor);
    }

    fn get(&self, id: ProcessId) -> Option<Arc<ProcessSupervisor>> {
        self.processes.read().get(&id).cloned()
    }

    fn remove(&self, id: ProcessId) -> Option<Arc<ProcessSupervisor>> {
        self.processes.write().remove(&id)
    }
}
