// SPDX-License-Identifier: MIT

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Scheduler non-stacking scenario (spec.md §4.8, §8 S7). Requires a
//! reachable Postgres instance at `DATABASE_URL`; ignored by default.

use crucible_core::{JobInput, OwnerId, RunStatus};
use crucible_storage::Store;
use crucible_worker::{Scheduler, SchedulerConfig};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn test_store() -> Store {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let store = Store::connect(&database_url, 5).await.expect("connect");
    store.migrate().await.expect("migrate");
    store
}

#[tokio::test]
#[ignore]
async fn s7_due_job_with_no_prior_run_fires_once_and_does_not_stack() {
    let store = test_store().await;
    let owner = OwnerId::new();
    let job = store
        .create_job(
            owner,
            JobInput {
                name: format!("s7-cron-{}", uuid::Uuid::new_v4()),
                image: "alpine".into(),
                command: vec!["true".into()],
                env: HashMap::new(),
                memory_mb: None,
                cpu_millicores: None,
                timeout_seconds: None,
                cron_schedule: Some("* * * * *".into()),
            },
        )
        .await
        .expect("create_job");

    let scheduler = Scheduler::new(store.clone(), SchedulerConfig { tick_interval: Duration::from_millis(50) });
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    // Two ticks' worth of time: one run should be enqueued, never two,
    // because it's never left pending.
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    let _ = handle.await;

    let runs = store.list_runs_for_job(owner, job.id).await.expect("list_runs_for_job");
    assert_eq!(runs.len(), 1, "non-stacking: exactly one run should have been enqueued");
    assert_eq!(runs[0].status, RunStatus::Pending);
}

#[tokio::test]
#[ignore]
async fn invalid_cron_expression_is_skipped_not_errored() {
    let store = test_store().await;
    let owner = OwnerId::new();
    let job = store
        .create_job(
            owner,
            JobInput {
                name: format!("s7-bad-cron-{}", uuid::Uuid::new_v4()),
                image: "alpine".into(),
                command: vec!["true".into()],
                env: HashMap::new(),
                memory_mb: None,
                cpu_millicores: None,
                timeout_seconds: None,
                cron_schedule: Some("not a schedule".into()),
            },
        )
        .await
        .expect("create_job");

    let scheduler = Scheduler::new(store.clone(), SchedulerConfig { tick_interval: Duration::from_millis(50) });
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(scheduler.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.cancel();
    let _ = handle.await;

    let runs = store.list_runs_for_job(owner, job.id).await.expect("list_runs_for_job");
    assert!(runs.is_empty(), "a malformed cron expression must never enqueue a run");
}
