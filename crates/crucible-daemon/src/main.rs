// SPDX-License-Identifier: MIT

//! Binary entry point: config load, migrations, and the concurrent task
//! graph spec.md §5 describes (worker pool, heartbeat emitters it spawns,
//! reaper, scheduler, HTTP server), wired with a shared shutdown
//! cancellation token. Structure grounded on
//! `fourthplaces-mntogether/packages/server/src/server/main.rs`'s
//! tracing-init -> config-load -> pool-connect -> migrate -> serve shape.

mod config;

use anyhow::{Context, Result};
use config::Config;
use crucible_runtime::DockerRuntime;
use crucible_storage::Store;
use crucible_worker::{ControlHandle, Reaper, ReaperConfig, RunRegistry, Scheduler, SchedulerConfig, WorkerPool, WorkerPoolConfig};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,crucible=debug,sqlx=warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting crucible");

    let config = Config::from_env().context("failed to load configuration")?;

    tracing::info!("connecting to database");
    let store = Store::connect(&config.database_url, 10).await.context("failed to connect to database")?;

    tracing::info!("running database migrations");
    store.migrate().await.context("failed to run migrations")?;

    // Startup reconciliation half of spec.md §9's open question: drop
    // queue rows whose run already reached a terminal state before this
    // process starts polling.
    let cleaned = store.cleanup_terminal_queue_rows().await.context("failed to clean up stale queue rows")?;
    if cleaned > 0 {
        tracing::info!(rows = cleaned, "cleaned up queue rows for already-terminal runs");
    }

    let runtime = Arc::new(DockerRuntime::connect().context("failed to connect to the container runtime")?);
    let registry = RunRegistry::new();

    let pool = WorkerPool::new(
        store.clone(),
        runtime.clone(),
        registry.clone(),
        WorkerPoolConfig {
            max_concurrent: config.max_concurrent,
            poll_interval: config.poll_interval,
            heartbeat_interval: config.heartbeat_interval,
            container_name_prefix: config.container_name_prefix.clone(),
            timeout_stop_grace: config.timeout_stop_grace,
        },
    );

    let reaper = Reaper::new(
        store.clone(),
        runtime.clone(),
        registry.clone(),
        ReaperConfig {
            sweep_interval: config.reaper_interval,
            stale_threshold: config.stale_threshold,
            stop_grace: config.stop_grace,
        },
    );

    let scheduler = Scheduler::new(store.clone(), SchedulerConfig { tick_interval: config.scheduler_interval });

    let control = ControlHandle::new(store.clone(), runtime.clone(), registry.clone(), config.stop_grace);
    let base_url = format!("http://{}", config.bind_addr);
    let app = crucible_api::build_router(control, base_url);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await.context("failed to bind HTTP listener")?;
    tracing::info!(addr = %config.bind_addr, "listening");

    let shutdown = CancellationToken::new();

    let pool_handle = tokio::spawn(Arc::clone(&pool).run(shutdown.clone()));
    let reaper_handle = tokio::spawn(reaper.run(shutdown.clone()));
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown.clone()));

    let server_shutdown = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move { server_shutdown.cancelled().await });

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server exited with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    // Reverse dependency order (spec.md §5): scheduler first (stop
    // creating new work), then the pool's dispatcher (stop claiming more),
    // then the reaper, then drain whatever the pool already has in flight.
    shutdown.cancel();
    let _ = scheduler_handle.await;
    let _ = pool_handle.await;
    let _ = reaper_handle.await;

    pool.wait_for_drain(config.shutdown_drain).await;

    tracing::info!("shutdown complete");
    Ok(())
}
