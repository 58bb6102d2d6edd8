// SPDX-License-Identifier: MIT

//! Cron-driven enqueueing for jobs with a `cron_schedule` (spec.md §4.8).
//! 5-field POSIX expressions are accepted at the API boundary; this module
//! prepends a synthesized `0` seconds field before handing them to the
//! `cron` crate, which only parses 6/7-field expressions.

use crate::control::SCHEDULED_TRIGGER_PRIORITY;
use crate::error::{Result, WorkerError};
use crucible_core::Job;
use crucible_storage::Store;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct SchedulerConfig {
    pub tick_interval: Duration,
}

pub struct Scheduler {
    store: Store,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(store: Store, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("scheduler shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.config.tick_interval) => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        let jobs = match self.store.list_active_cron_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(error = %e, "failed to list scheduled jobs");
                return;
            }
        };

        for job in jobs {
            if let Err(e) = self.maybe_fire(&job).await {
                warn!(job_id = %job.id, error = %e, "scheduler tick failed for job");
            }
        }
    }

    async fn maybe_fire(&self, job: &Job) -> Result<()> {
        let Some(expr) = job.cron_schedule.as_deref() else { return Ok(()) };
        let schedule = parse_cron(expr)?;

        // Non-stacking rule: a job with a run still in flight is left
        // alone even if its schedule says it's due (spec.md §4.8 step 2).
        if self.store.count_nonterminal_runs(job.id).await? > 0 {
            return Ok(());
        }

        let since = self.store.most_recent_run_created_at(job.id).await?.unwrap_or_else(|| {
            chrono::DateTime::from_timestamp(0, 0).unwrap_or_else(chrono::Utc::now)
        });

        let Some(next_fire) = schedule.after(&since).next() else { return Ok(()) };
        if next_fire > chrono::Utc::now() {
            return Ok(());
        }

        let now = chrono::Utc::now();
        self.store.enqueue(job.id, job.owner_id, SCHEDULED_TRIGGER_PRIORITY, now).await?;
        info!(job_id = %job.id, "scheduled run enqueued");
        Ok(())
    }
}

fn parse_cron(expr: &str) -> Result<cron::Schedule> {
    let with_seconds = format!("0 {expr}");
    cron::Schedule::from_str(&with_seconds).map_err(|e| WorkerError::InvalidCron(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_field_expression_parses_with_synthesized_seconds() {
        assert!(parse_cron("*/5 * * * *").is_ok());
    }

    #[test]
    fn malformed_expression_is_rejected() {
        assert!(parse_cron("not a schedule").is_err());
    }
}
