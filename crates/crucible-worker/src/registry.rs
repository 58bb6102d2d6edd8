// SPDX-License-Identifier: MIT

//! Tracks which run is executing in which container on this process, so a
//! control command (pause/resume/kill) arriving over HTTP can reach the
//! live container instead of only the database row (spec.md §4.9).

use crucible_core::RunId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct RunRegistry {
    inner: Arc<RwLock<HashMap<RunId, String>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, run_id: RunId, container_id: String) {
        self.inner.write().insert(run_id, container_id);
    }

    pub fn unregister(&self, run_id: RunId) {
        self.inner.write().remove(&run_id);
    }

    /// `None` means the run isn't supervised by this process — either it
    /// hasn't started yet, it already finished, or (in a multi-worker
    /// deployment) another process owns it.
    pub fn container_id(&self, run_id: RunId) -> Option<String> {
        self.inner.read().get(&run_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.inner.read().len()
    }
}
