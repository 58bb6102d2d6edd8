// SPDX-License-Identifier: MIT

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! End-to-end supervision scenarios against a real Postgres store and a
//! [`FakeContainerRuntime`] (spec.md §8 S1-S5). Requires a reachable
//! Postgres instance at `DATABASE_URL`; ignored by default so `cargo
//! test` stays hermetic without a database, matching
//! `crucible-storage`'s integration test gating.
//!
//! Run with: `DATABASE_URL=... cargo test -p crucible-worker -- --ignored`

use crucible_core::{JobInput, OwnerId, RunStatus};
use crucible_runtime::fake::{FakeContainerRuntime, ScriptedOutcome};
use crucible_storage::Store;
use crucible_worker::{ControlHandle, RunRegistry, WorkerPool, WorkerPoolConfig};
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

fn job_input(name: &str, timeout_seconds: u32) -> JobInput {
    JobInput {
        name: name.to_string(),
        image: "alpine".into(),
        command: vec!["echo".into(), "hi".into()],
        env: HashMap::new(),
        memory_mb: None,
        cpu_millicores: None,
        timeout_seconds: Some(timeout_seconds),
        cron_schedule: None,
    }
}

fn pool_config() -> WorkerPoolConfig {
    WorkerPoolConfig {
        max_concurrent: 2,
        poll_interval: Duration::from_millis(20),
        heartbeat_interval: Duration::from_millis(100),
        container_name_prefix: "test".into(),
        timeout_stop_grace: Duration::from_millis(200),
    }
}

/// Polls the run until it reaches a terminal state or `timeout` elapses.
async fn await_terminal(store: &Store, owner: OwnerId, run_id: crucible_core::RunId, timeout: Duration) -> crucible_core::Run {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let run = store.get_run(owner, run_id).await.expect("get_run");
        if run.status.is_terminal() || tokio::time::Instant::now() >= deadline {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
#[ignore]
async fn s1_success_path_reaches_succeeded() {
    let store = test_store().await;
    let owner = OwnerId::new();
    let job = store.create_job(owner, job_input("s1-hello", 60)).await.expect("create_job");
    let run = store.enqueue(job.id, owner, 0, chrono::Utc::now()).await.expect("enqueue");

    let runtime = Arc::new(FakeContainerRuntime::new());
    let registry = RunRegistry::new();
    let pool = WorkerPool::new(store.clone(), runtime, registry, pool_config());
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(pool.run(shutdown.clone()));

    let finished = await_terminal(&store, owner, run.id, Duration::from_secs(5)).await;
    shutdown.cancel();
    let _ = handle.await;

    assert_eq!(finished.status, RunStatus::Succeeded);
    assert_eq!(finished.exit_code, Some(0));
    assert!(finished.duration_ms.unwrap_or(0) >= 0);
}

#[tokio::test]
#[ignore]
async fn s2_non_zero_exit_is_failed_with_exit_code() {
    let store = test_store().await;
    let owner = OwnerId::new();
    let job = store.create_job(owner, job_input("s2-exit7", 60)).await.expect("create_job");
    let run = store.enqueue(job.id, owner, 0, chrono::Utc::now()).await.expect("enqueue");

    let runtime = Arc::new(FakeContainerRuntime::new());
    runtime.set_default_outcome(ScriptedOutcome::Exit(7));
    let registry = RunRegistry::new();
    let pool = WorkerPool::new(store.clone(), runtime, registry, pool_config());
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(pool.run(shutdown.clone()));

    let finished = await_terminal(&store, owner, run.id, Duration::from_secs(5)).await;
    shutdown.cancel();
    let _ = handle.await;

    assert_eq!(finished.status, RunStatus::Failed);
    assert_eq!(finished.exit_code, Some(7));
    assert_eq!(finished.error_message.as_deref(), Some("exit code 7"));
}

#[tokio::test]
#[ignore]
async fn s3_timeout_fails_with_timeout_message() {
    let store = test_store().await;
    let owner = OwnerId::new();
    let job = store.create_job(owner, job_input("s3-timeout", 1)).await.expect("create_job");
    let run = store.enqueue(job.id, owner, 0, chrono::Utc::now()).await.expect("enqueue");

    let runtime = Arc::new(FakeContainerRuntime::new());
    runtime.set_default_outcome(ScriptedOutcome::RunsUntilStopped);
    let registry = RunRegistry::new();
    let pool = WorkerPool::new(store.clone(), runtime, registry, pool_config());
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(pool.run(shutdown.clone()));

    let finished = await_terminal(&store, owner, run.id, Duration::from_secs(5)).await;
    shutdown.cancel();
    let _ = handle.await;

    assert_eq!(finished.status, RunStatus::Failed);
    assert_eq!(finished.error_message.as_deref(), Some("timeout exceeded (1s limit)"));
}

#[tokio::test]
#[ignore]
async fn s4_kill_wins_over_natural_exit() {
    let store = test_store().await;
    let owner = OwnerId::new();
    let job = store.create_job(owner, job_input("s4-kill", 60)).await.expect("create_job");
    let run = store.enqueue(job.id, owner, 0, chrono::Utc::now()).await.expect("enqueue");

    let runtime = Arc::new(FakeContainerRuntime::new());
    runtime.set_default_outcome(ScriptedOutcome::RunsUntilStopped);
    let registry = RunRegistry::new();
    let control = ControlHandle::new(store.clone(), runtime.clone(), registry.clone(), Duration::from_millis(200));
    let pool = WorkerPool::new(store.clone(), runtime, registry, pool_config());
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(pool.run(shutdown.clone()));

    // Wait for the run to actually start before killing it.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = store.get_run(owner, run.id).await.expect("get_run");
        if current.status == RunStatus::Running {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "run never reached running");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    control.kill(owner, run.id).await.expect("kill");

    let finished = await_terminal(&store, owner, run.id, Duration::from_secs(5)).await;
    shutdown.cancel();
    let _ = handle.await;

    assert_eq!(finished.status, RunStatus::Cancelled);
    assert_eq!(finished.error_message.as_deref(), Some("killed by user"));
}

#[tokio::test]
#[ignore]
async fn s5_pause_then_resume_still_succeeds() {
    let store = test_store().await;
    let owner = OwnerId::new();
    let job = store.create_job(owner, job_input("s5-pause", 60)).await.expect("create_job");
    let run = store.enqueue(job.id, owner, 0, chrono::Utc::now()).await.expect("enqueue");

    let runtime = Arc::new(FakeContainerRuntime::new());
    runtime.set_default_outcome(ScriptedOutcome::RunsUntilStopped);
    let registry = RunRegistry::new();
    let control = ControlHandle::new(store.clone(), runtime.clone(), registry.clone(), Duration::from_millis(200));
    let pool = WorkerPool::new(store.clone(), runtime.clone(), registry, pool_config());
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(pool.run(shutdown.clone()));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let current = store.get_run(owner, run.id).await.expect("get_run");
        if current.status == RunStatus::Running {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "run never reached running");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let paused = control.pause(owner, run.id).await.expect("pause");
    assert_eq!(paused.status, RunStatus::Paused);
    assert!(paused.paused_at.is_some());

    let resumed = control.resume(owner, run.id).await.expect("resume");
    assert_eq!(resumed.status, RunStatus::Running);
    assert!(resumed.paused_at.is_none());

    // Let the container actually exit now, simulating its command finishing.
    let container_id = registry_container_id(&store, owner, run.id).await;
    runtime.force_exit(&container_id, 0);

    let finished = await_terminal(&store, owner, run.id, Duration::from_secs(5)).await;
    shutdown.cancel();
    let _ = handle.await;

    assert_eq!(finished.status, RunStatus::Succeeded);
}

async fn registry_container_id(store: &Store, owner: OwnerId, run_id: crucible_core::RunId) -> String {
    store.get_run(owner, run_id).await.expect("get_run").container_id.expect("container id should be set by now")
}
