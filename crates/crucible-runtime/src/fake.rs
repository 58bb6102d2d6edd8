// SPDX-License-Identifier: MIT

//! An in-memory [`ContainerRuntime`] for tests that exercise the worker
//! pool's orchestration logic without a Docker daemon. Grounded on the
//! `test-support` double idiom in
//! `examples/alfredjeanlab-oddjobs/crates/core/src/test_support.rs`:
//! a real collaborator replaced by a controllable, introspectable double.

use crate::error::{Result, RuntimeError};
use crate::runtime::ContainerRuntime;
use crate::spec::{ContainerSpec, ExitStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Exit(i64),
    /// `wait` never resolves on its own; the fake only returns once
    /// [`FakeContainerRuntime::force_exit`] is called, mimicking `stop`.
    RunsUntilStopped,
}

impl Default for ScriptedOutcome {
    fn default() -> Self {
        ScriptedOutcome::Exit(0)
    }
}

struct ContainerState {
    paused: bool,
    stopped: bool,
    outcome: ScriptedOutcome,
}

/// Deterministic double for [`ContainerRuntime`]. Every container created
/// through it is scripted up front with how it should behave on `wait`.
#[derive(Default)]
pub struct FakeContainerRuntime {
    next_id: Mutex<u64>,
    containers: Mutex<HashMap<String, ContainerState>>,
    default_outcome: Mutex<ScriptedOutcome>,
    pub pulled_images: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(0),
            containers: Mutex::new(HashMap::new()),
            default_outcome: Mutex::new(ScriptedOutcome::Exit(0)),
            pulled_images: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    /// Every container created after this call exits with `outcome` unless
    /// overridden per-container via [`Self::script`].
    pub fn set_default_outcome(&self, outcome: ScriptedOutcome) {
        *self.default_outcome.lock() = outcome;
    }

    pub fn script(&self, container_id: &str, outcome: ScriptedOutcome) {
        if let Some(state) = self.containers.lock().get_mut(container_id) {
            state.outcome = outcome;
        }
    }

    /// Simulates `stop` actually taking effect for a container scripted as
    /// [`ScriptedOutcome::RunsUntilStopped`].
    pub fn force_exit(&self, container_id: &str, code: i64) {
        if let Some(state) = self.containers.lock().get_mut(container_id) {
            state.outcome = ScriptedOutcome::Exit(code);
            state.stopped = true;
        }
    }

    pub fn is_paused(&self, container_id: &str) -> bool {
        self.containers.lock().get(container_id).map(|s| s.paused).unwrap_or(false)
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn pull(&self, image: &str) -> Result<()> {
        self.pulled_images.lock().push(image.to_string());
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        let id = format!("fake-{}-{}", spec.name, next_id);
        let outcome = self.default_outcome.lock().clone();
        self.containers.lock().insert(id.clone(), ContainerState { paused: false, stopped: false, outcome });
        Ok(id)
    }

    async fn start(&self, container_id: &str) -> Result<()> {
        if self.containers.lock().contains_key(container_id) {
            Ok(())
        } else {
            Err(RuntimeError::NotFound(container_id.to_string()))
        }
    }

    async fn wait(&self, container_id: &str) -> Result<ExitStatus> {
        loop {
            let outcome = {
                let containers = self.containers.lock();
                let state = containers.get(container_id).ok_or_else(|| RuntimeError::NotFound(container_id.to_string()))?;
                state.outcome.clone()
            };
            match outcome {
                ScriptedOutcome::Exit(code) => return Ok(ExitStatus::Exited(code)),
                ScriptedOutcome::RunsUntilStopped => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
    }

    async fn pause(&self, container_id: &str) -> Result<()> {
        let mut containers = self.containers.lock();
        let state = containers.get_mut(container_id).ok_or_else(|| RuntimeError::NotFound(container_id.to_string()))?;
        state.paused = true;
        Ok(())
    }

    async fn unpause(&self, container_id: &str) -> Result<()> {
        let mut containers = self.containers.lock();
        let state = containers.get_mut(container_id).ok_or_else(|| RuntimeError::NotFound(container_id.to_string()))?;
        state.paused = false;
        Ok(())
    }

    async fn stop(&self, container_id: &str, _grace: Duration) -> Result<()> {
        self.force_exit(container_id, 137);
        Ok(())
    }

    async fn remove(&self, container_id: &str) -> Result<()> {
        self.removed.lock().push(container_id.to_string());
        self.containers.lock().remove(container_id);
        Ok(())
    }

    async fn logs_tail(&self, _container_id: &str) -> Result<String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_exit_resolves_wait() {
        let runtime = FakeContainerRuntime::new();
        let spec = ContainerSpec {
            name: "t1".into(),
            image: "alpine".into(),
            command: vec![],
            env: HashMap::new(),
            memory_bytes: 0,
            nano_cpus: 0,
        };
        let id = runtime.create(&spec).await.unwrap();
        runtime.start(&id).await.unwrap();
        runtime.script(&id, ScriptedOutcome::Exit(3));
        assert_eq!(runtime.wait(&id).await.unwrap(), ExitStatus::Exited(3));
    }

    #[tokio::test]
    async fn stop_forces_a_running_until_stopped_container_to_exit() {
        let runtime = FakeContainerRuntime::new();
        runtime.set_default_outcome(ScriptedOutcome::RunsUntilStopped);
        let spec = ContainerSpec {
            name: "t2".into(),
            image: "alpine".into(),
            command: vec![],
            env: HashMap::new(),
            memory_bytes: 0,
            nano_cpus: 0,
        };
        let id = runtime.create(&spec).await.unwrap();
        runtime.start(&id).await.unwrap();

        runtime.stop(&id, Duration::from_secs(1)).await.unwrap();
        assert_eq!(runtime.wait(&id).await.unwrap(), ExitStatus::Exited(137));
    }
}
