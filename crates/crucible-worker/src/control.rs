// SPDX-License-Identifier: MIT

//! The entry point control commands (spec.md §4.9, §6) use to reach both
//! the durable record and whatever container is actually running a run.
//! `crucible-api` holds one of these and never touches [`Store`] or
//! [`ContainerRuntime`] directly.

use crate::error::Result;
use crate::registry::RunRegistry;
use crucible_core::{Job, JobId, JobInput, OwnerId, Run, RunId};
use crucible_runtime::ContainerRuntime;
use crucible_storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Runs triggered manually jump ahead of cron-scheduled ones in the queue
/// (spec.md §4.4 "priority... higher values are claimed first").
pub const MANUAL_TRIGGER_PRIORITY: i32 = 10;
pub const SCHEDULED_TRIGGER_PRIORITY: i32 = 0;

#[derive(Clone)]
pub struct ControlHandle {
    store: Store,
    runtime: Arc<dyn ContainerRuntime>,
    registry: RunRegistry,
    stop_grace: Duration,
}

impl ControlHandle {
    pub fn new(store: Store, runtime: Arc<dyn ContainerRuntime>, registry: RunRegistry, stop_grace: Duration) -> Self {
        Self { store, runtime, registry, stop_grace }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn create_job(&self, owner_id: OwnerId, input: JobInput) -> Result<Job> {
        Ok(self.store.create_job(owner_id, input).await?)
    }

    pub async fn get_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<Job> {
        Ok(self.store.get_job(owner_id, job_id).await?)
    }

    pub async fn list_jobs(&self, owner_id: OwnerId) -> Result<Vec<Job>> {
        Ok(self.store.list_jobs(owner_id).await?)
    }

    pub async fn delete_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<()> {
        Ok(self.store.delete_job(owner_id, job_id).await?)
    }

    pub async fn regenerate_webhook_token(&self, owner_id: OwnerId, job_id: JobId) -> Result<String> {
        Ok(self.store.regenerate_webhook_token(owner_id, job_id).await?)
    }

    /// Manual trigger via the control API (spec.md §6 `POST /jobs/{id}/run`).
    pub async fn trigger(&self, owner_id: OwnerId, job_id: JobId) -> Result<Run> {
        let job = self.store.get_job(owner_id, job_id).await?;
        let run = self.store.enqueue(job.id, owner_id, MANUAL_TRIGGER_PRIORITY, chrono::Utc::now()).await?;
        Ok(run)
    }

    /// Webhook trigger (spec.md §6, §9): looked up by token rather than an
    /// authenticated owner, so it runs as whichever owner created the job.
    pub async fn trigger_by_webhook_token(&self, token: &str) -> Result<Run> {
        let job = self.store.find_job_by_webhook_token(token).await?;
        let run = self.store.enqueue(job.id, job.owner_id, SCHEDULED_TRIGGER_PRIORITY, chrono::Utc::now()).await?;
        Ok(run)
    }

    pub async fn get_run(&self, owner_id: OwnerId, run_id: RunId) -> Result<Run> {
        Ok(self.store.get_run(owner_id, run_id).await?)
    }

    pub async fn list_runs_for_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<Vec<Run>> {
        Ok(self.store.list_runs_for_job(owner_id, job_id).await?)
    }

    pub async fn pause(&self, owner_id: OwnerId, run_id: RunId) -> Result<Run> {
        let run = self.store.pause(owner_id, run_id, chrono::Utc::now()).await?;
        if let Some(container_id) = self.registry.container_id(run_id) {
            if let Err(e) = self.runtime.pause(&container_id).await {
                warn!(run_id = %run_id, error = %e, "failed to pause container after pausing run record");
            }
        }
        Ok(run)
    }

    pub async fn resume(&self, owner_id: OwnerId, run_id: RunId) -> Result<Run> {
        let run = self.store.resume(owner_id, run_id).await?;
        if let Some(container_id) = self.registry.container_id(run_id) {
            if let Err(e) = self.runtime.unpause(&container_id).await {
                warn!(run_id = %run_id, error = %e, "failed to unpause container after resuming run record");
            }
        }
        Ok(run)
    }

    /// Kills a running or paused run. Writes the terminal state first so
    /// the supervisor's own finalize write loses the race if it lands
    /// after this one (spec.md §4.9 "first writer wins"), then stops the
    /// container the supervisor is watching.
    pub async fn kill(&self, owner_id: OwnerId, run_id: RunId) -> Result<Run> {
        let run = self.store.kill(owner_id, run_id, chrono::Utc::now()).await?;
        if let Some(container_id) = self.registry.container_id(run_id) {
            if let Err(e) = self.runtime.stop(&container_id, self.stop_grace).await {
                warn!(run_id = %run_id, error = %e, "failed to stop container after killing run record");
            }
        }
        Ok(run)
    }

    /// Live tail if a container for this run is currently supervised by
    /// this process, otherwise the last tail persisted at finalize time.
    pub async fn logs(&self, owner_id: OwnerId, run_id: RunId) -> Result<String> {
        let run = self.store.get_run(owner_id, run_id).await?;
        if let Some(container_id) = self.registry.container_id(run_id) {
            if let Ok(tail) = self.runtime.logs_tail(&container_id).await {
                return Ok(tail);
            }
        }
        Ok(run.logs_tail.unwrap_or_default())
    }
}
