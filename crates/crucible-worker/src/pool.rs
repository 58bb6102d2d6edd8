// SPDX-License-Identifier: MIT

//! The worker pool: claims queued runs and supervises each one through its
//! full container lifecycle (spec.md §4.5). Dispatcher shape (biased
//! `select!` against a shutdown signal) grounded on
//! `examples/other_examples/aaf0fb5c_runtarahq-runtara__crates-runtara-environment-src-heartbeat_monitor.rs.rs`.

use crate::heartbeat::run_heartbeat_loop;
use crate::registry::RunRegistry;
use crucible_core::{ClaimedRun, Job, Termination};
use crucible_runtime::{ContainerRuntime, ContainerSpec, ExitStatus};
use crucible_storage::Store;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of [`WorkerPool::await_exit`]; kept distinct from
/// [`ExitStatus`] so a timeout isn't confused with an engine-reported
/// unknown exit.
enum ExitOutcome {
    Ran(ExitStatus),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub container_name_prefix: String,
    /// Grace period for the `Stop` issued when a run's timeout fires
    /// (spec.md §4.5 step 8: "StopContainer(id, grace=5)"). Distinct from
    /// the 10s grace `ControlHandle::kill` and the reaper use.
    pub timeout_stop_grace: Duration,
}

pub struct WorkerPool {
    store: Store,
    runtime: Arc<dyn ContainerRuntime>,
    registry: RunRegistry,
    config: WorkerPoolConfig,
    semaphore: Arc<Semaphore>,
    active_runs: AtomicUsize,
}

impl WorkerPool {
    pub fn new(store: Store, runtime: Arc<dyn ContainerRuntime>, registry: RunRegistry, config: WorkerPoolConfig) -> Arc<Self> {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Arc::new(Self { store, runtime, registry, config, semaphore, active_runs: AtomicUsize::new(0) })
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Runs the claim-and-dispatch loop until `shutdown` fires. Returns
    /// once the loop has exited; in-flight supervised runs keep going
    /// until they finish or until the caller separately stops their
    /// containers (spec.md's Configuration module, `SHUTDOWN_DRAIN_SECS`).
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(max_concurrent = self.config.max_concurrent, "worker pool starting");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("worker pool dispatcher shutting down");
                    break;
                }
                permit = Arc::clone(&self.semaphore).acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    match self.store.claim().await {
                        Ok(Some(claimed)) => {
                            let pool = Arc::clone(&self);
                            self.active_runs.fetch_add(1, Ordering::SeqCst);
                            tokio::spawn(async move {
                                pool.supervise(claimed).await;
                                pool.active_runs.fetch_sub(1, Ordering::SeqCst);
                                drop(permit);
                            });
                        }
                        Ok(None) => {
                            drop(permit);
                            tokio::select! {
                                _ = tokio::time::sleep(self.config.poll_interval) => {}
                                _ = shutdown.cancelled() => break,
                            }
                        }
                        Err(e) => {
                            error!(error = %e, "failed to claim queued run");
                            drop(permit);
                            tokio::time::sleep(self.config.poll_interval).await;
                        }
                    }
                }
            }
        }
    }

    /// Polls until every supervised run this process started has finished,
    /// or `timeout` elapses, whichever comes first.
    pub async fn wait_for_drain(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.active_runs.load(Ordering::SeqCst) > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(remaining = self.active_runs.load(Ordering::SeqCst), "drain timed out with runs still active");
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn supervise(&self, claimed: ClaimedRun) {
        let ClaimedRun { queue_id, job, run } = claimed;
        let run_id = run.id;

        let now = chrono::Utc::now();
        match self.store.mark_running(run_id, now).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(run_id = %run_id, "run was no longer pending at start of supervision");
                let _ = self.store.cleanup_queue(queue_id).await;
                return;
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "failed to mark run running");
                let _ = self.store.cleanup_queue(queue_id).await;
                return;
            }
        }

        // Heartbeat starts as soon as the run is marked running, in
        // parallel with everything that follows (spec.md §4.5 step 2), so
        // a slow image pull doesn't burn into the reaper's stale-threshold
        // slack before the first liveness stamp lands.
        let heartbeat_cancel = CancellationToken::new();
        let heartbeat_handle = tokio::spawn(run_heartbeat_loop(
            self.store.clone(),
            run_id,
            self.config.heartbeat_interval,
            heartbeat_cancel.clone(),
        ));

        let termination = self.drive_container(&job, run_id, now).await;

        heartbeat_cancel.cancel();
        let _ = heartbeat_handle.await;

        let finished_at = chrono::Utc::now();
        let duration_ms = (finished_at - now).num_milliseconds();

        let logs_tail = if let Some(container_id) = self.registry.container_id(run_id) {
            self.runtime.logs_tail(&container_id).await.ok()
        } else {
            None
        };

        match self.store.finalize(run_id, &termination, logs_tail.as_deref(), finished_at, duration_ms).await {
            Ok(true) => info!(run_id = %run_id, status = %termination.status(), "run finished"),
            Ok(false) => info!(run_id = %run_id, "run already finalized by a concurrent control command"),
            Err(e) => error!(run_id = %run_id, error = %e, "failed to finalize run"),
        }

        if let Some(container_id) = self.registry.container_id(run_id) {
            if let Err(e) = self.runtime.remove(&container_id).await {
                warn!(run_id = %run_id, container_id = %container_id, error = %e, "failed to remove finished container");
            }
        }
        self.registry.unregister(run_id);
        let _ = self.store.cleanup_queue(queue_id).await;
    }

    /// Runs a run's container to completion and returns how it ended. Every
    /// early-return path has already recorded the pre-exec failure in the
    /// store; the caller still performs the common cleanup (logs, registry,
    /// queue row) uniformly for every outcome.
    async fn drive_container(&self, job: &Job, run_id: crucible_core::RunId, _started_at: chrono::DateTime<chrono::Utc>) -> Termination {
        let container_name = format!("{}-{}-{}", self.config.container_name_prefix, job.name, run_id.short());
        let spec = ContainerSpec {
            name: container_name,
            image: job.image.clone(),
            command: job.command.clone(),
            env: job.env.clone(),
            memory_bytes: job.memory_bytes(),
            nano_cpus: job.nano_cpus(),
        };

        if let Err(e) = self.runtime.pull(&spec.image).await {
            return self.fail_pre_exec(run_id, format!("image pull failed: {e}")).await;
        }

        let container_id = match self.runtime.create(&spec).await {
            Ok(id) => id,
            Err(e) => return self.fail_pre_exec(run_id, format!("container create failed: {e}")).await,
        };

        if let Err(e) = self.store.set_container_id(run_id, &container_id).await {
            warn!(run_id = %run_id, error = %e, "failed to persist container id");
        }
        self.registry.register(run_id, container_id.clone());

        // The wait future must be registered with the engine before start
        // so a container that exits within microseconds of starting can't
        // slip past us (spec.md §4.5 step ordering).
        let runtime = Arc::clone(&self.runtime);
        let wait_container_id = container_id.clone();
        let wait_handle = tokio::spawn(async move { runtime.wait(&wait_container_id).await });

        if let Err(e) = self.runtime.start(&container_id).await {
            wait_handle.abort();
            return Termination::Failed { error: format!("container start failed: {e}"), exit_code: None };
        }

        match self.await_exit(job, &container_id, wait_handle).await {
            ExitOutcome::Ran(ExitStatus::Exited(0)) => Termination::Succeeded,
            ExitOutcome::Ran(ExitStatus::Exited(code)) => {
                Termination::Failed { error: format!("exit code {code}"), exit_code: Some(code as i32) }
            }
            ExitOutcome::Ran(ExitStatus::Unknown) => {
                Termination::Failed { error: "container exit status unknown".into(), exit_code: None }
            }
            ExitOutcome::TimedOut => Termination::Failed {
                error: format!("timeout exceeded ({}s limit)", job.timeout_seconds),
                exit_code: None,
            },
        }
    }

    /// Awaits the container's exit, enforcing the job's timeout if it has
    /// one (spec.md §4.5 step 9, §6 `timeout_seconds`).
    async fn await_exit(
        &self,
        job: &Job,
        container_id: &str,
        wait_handle: tokio::task::JoinHandle<crucible_runtime::Result<ExitStatus>>,
    ) -> ExitOutcome {
        let joined = match job.timeout() {
            Some(timeout) => match tokio::time::timeout(timeout, wait_handle).await {
                Ok(joined) => joined,
                Err(_elapsed) => {
                    warn!(container_id, "run exceeded its configured timeout, stopping");
                    let _ = self.runtime.stop(container_id, self.config.timeout_stop_grace).await;
                    return ExitOutcome::TimedOut;
                }
            },
            None => wait_handle.await,
        };

        match joined {
            Ok(Ok(status)) => ExitOutcome::Ran(status),
            Ok(Err(e)) => {
                error!(container_id, error = %e, "wait failed");
                ExitOutcome::Ran(ExitStatus::Unknown)
            }
            Err(_join_err) => {
                error!(container_id, "wait task panicked");
                ExitOutcome::Ran(ExitStatus::Unknown)
            }
        }
    }

    async fn fail_pre_exec(&self, run_id: crucible_core::RunId, error: String) -> Termination {
        let now = chrono::Utc::now();
        if let Err(e) = self.store.fail_pending(run_id, &error, now).await {
            warn!(run_id = %run_id, error = %e, "failed to record pre-exec failure");
        }
        Termination::Failed { error, exit_code: None }
    }
}
