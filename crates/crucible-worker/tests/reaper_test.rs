// SPDX-License-Identifier: MIT

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Reaper sweep scenario (spec.md §4.7, §8 S6): a run whose heartbeat
//! goes stale while its container is still notionally alive must be
//! forced to `failed` and have its queue row cleared. Requires a
//! reachable Postgres instance at `DATABASE_URL`; ignored by default.

use chrono::Duration as ChronoDuration;
use crucible_core::{JobInput, OwnerId, RunStatus};
use crucible_runtime::fake::{FakeContainerRuntime, ScriptedOutcome};
use crucible_storage::Store;
use crucible_worker::{Reaper, ReaperConfig, RunRegistry};
use std::collections::HashMap;
use std::sync::Arc;
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
async fn s6_stale_heartbeat_is_reaped_to_failed_and_queue_row_cleared() {
    let store = test_store().await;
    let owner = OwnerId::new();
    let job = store
        .create_job(
            owner,
            JobInput {
                name: format!("s6-orphan-{}", uuid::Uuid::new_v4()),
                image: "alpine".into(),
                command: vec!["sleep".into(), "60".into()],
                env: HashMap::new(),
                memory_mb: None,
                cpu_millicores: None,
                timeout_seconds: None,
                cron_schedule: None,
            },
        )
        .await
        .expect("create_job");

    let run = store.enqueue(job.id, owner, 0, chrono::Utc::now()).await.expect("enqueue");
    let _claimed = store.claim().await.expect("claim").expect("a row was queued");

    // Simulate a worker that claimed the run, started it, then crashed
    // before ever stamping a heartbeat past the stale threshold.
    let long_ago = chrono::Utc::now() - ChronoDuration::seconds(120);
    store.mark_running(run.id, long_ago).await.expect("mark_running");

    let runtime = Arc::new(FakeContainerRuntime::new());
    runtime.set_default_outcome(ScriptedOutcome::RunsUntilStopped);
    let registry = RunRegistry::new();
    let reaper = Reaper::new(
        store.clone(),
        runtime,
        registry,
        ReaperConfig {
            sweep_interval: Duration::from_millis(50),
            stale_threshold: Duration::from_secs(60),
            stop_grace: Duration::from_millis(100),
        },
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(reaper.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.cancel();
    let _ = handle.await;

    let reaped = store.get_run(owner, run.id).await.expect("get_run");
    assert_eq!(reaped.status, RunStatus::Failed);
    assert_eq!(reaped.error_message.as_deref(), Some("heartbeat timeout: worker may have crashed"));

    // Queue row must be gone (spec.md §3 invariant: terminal runs have no queue row).
    let reclaimed = store.claim().await.expect("claim");
    assert!(reclaimed.is_none());
}
