// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! crucible-worker: the worker pool, heartbeat emitter, reaper, and
//! scheduler that together turn queued runs into supervised containers
//! (spec.md §4.5-§4.8), plus the control-command entry point
//! `crucible-api` drives (spec.md §4.9).

mod control;
mod error;
mod heartbeat;
mod pool;
mod reaper;
mod registry;
mod scheduler;

pub use control::{ControlHandle, MANUAL_TRIGGER_PRIORITY, SCHEDULED_TRIGGER_PRIORITY};
pub use error::{Result, WorkerError};
pub use pool::{WorkerPool, WorkerPoolConfig};
pub use reaper::{Reaper, ReaperConfig};
pub use registry::RunRegistry;
pub use scheduler::{Scheduler, SchedulerConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::RunId;

    #[test]
    fn registry_round_trips_a_container_id() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        assert_eq!(registry.container_id(run_id), None);

        registry.register(run_id, "container-1".into());
        assert_eq!(registry.container_id(run_id), Some("container-1".into()));
        assert_eq!(registry.active_count(), 1);

        registry.unregister(run_id);
        assert_eq!(registry.container_id(run_id), None);
        assert_eq!(registry.active_count(), 0);
    }
}
