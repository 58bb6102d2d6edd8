// SPDX-License-Identifier: MIT

//! Sweeps runs whose heartbeat has gone stale, failing them so a crashed
//! worker process can never leave a run stuck `running` forever (spec.md
//! §4.7). Loop shape grounded on
//! `examples/other_examples/aaf0fb5c_runtarahq-runtara__crates-runtara-environment-src-heartbeat_monitor.rs.rs`.

use crate::registry::RunRegistry;
use chrono::Duration as ChronoDuration;
use crucible_runtime::ContainerRuntime;
use crucible_storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct ReaperConfig {
    pub sweep_interval: Duration,
    pub stale_threshold: Duration,
    /// Grace period for the `Stop` issued before `Remove` (spec.md §4.7
    /// step 1: "StopContainer(id, grace=10)").
    pub stop_grace: Duration,
}

pub struct Reaper {
    store: Store,
    runtime: Arc<dyn ContainerRuntime>,
    registry: RunRegistry,
    config: ReaperConfig,
}

impl Reaper {
    pub fn new(store: Store, runtime: Arc<dyn ContainerRuntime>, registry: RunRegistry, config: ReaperConfig) -> Self {
        Self { store, runtime, registry, config }
    }

    /// Runs one reconciliation pass at startup, then sweeps periodically
    /// until `shutdown` fires (spec.md §4.7 "runs on an interval, and once
    /// at startup").
    pub async fn run(self, shutdown: CancellationToken) {
        self.reap_once().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("reaper shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.config.sweep_interval) => {
                    self.reap_once().await;
                }
            }
        }
    }

    async fn reap_once(&self) {
        let threshold = ChronoDuration::from_std(self.config.stale_threshold)
            .unwrap_or_else(|_| ChronoDuration::seconds(60));

        let stale = match self.store.stale_runs(threshold).await {
            Ok(runs) => runs,
            Err(e) => {
                warn!(error = %e, "failed to list stale runs");
                return;
            }
        };

        for run in stale {
            let now = chrono::Utc::now();
            match self.store.reaper_fail(run.id, now).await {
                Ok(true) => {
                    warn!(run_id = %run.id, job_id = %run.job_id, "reaped stale run");
                    if let Some(container_id) = self.registry.container_id(run.id).or(run.container_id.clone()) {
                        if let Err(e) = self.runtime.stop(&container_id, self.config.stop_grace).await {
                            warn!(run_id = %run.id, container_id = %container_id, error = %e, "failed to stop orphaned container");
                        }
                        if let Err(e) = self.runtime.remove(&container_id).await {
                            warn!(run_id = %run.id, container_id = %container_id, error = %e, "failed to remove orphaned container");
                        }
                    }
                    self.registry.unregister(run.id);
                    if let Err(e) = self.store.delete_queue_row_for_run(run.id).await {
                        warn!(run_id = %run.id, error = %e, "failed to clear queue row for reaped run");
                    }
                }
                Ok(false) => {
                    // Resolved naturally between the scan and this write.
                }
                Err(e) => warn!(run_id = %run.id, error = %e, "failed to fail stale run"),
            }
        }

        if let Err(e) = self.store.cleanup_terminal_queue_rows().await {
            warn!(error = %e, "failed to clean up terminal queue rows");
        }
    }
}
