// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! crucible-api: the `axum` HTTP layer (spec.md §6). Routes translate
//! external commands into [`crucible_worker::ControlHandle`] calls;
//! request authentication, routing middleware choices, and JSON
//! marshaling beyond these DTOs are external collaborators (spec.md §1).

mod auth;
mod dto;
mod error;
mod jobs;
mod runs;
mod webhooks;

use axum::routing::{get, post};
use axum::Router;
use crucible_worker::ControlHandle;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared handler state: the single entry point into the store/runtime
/// (`ControlHandle`) plus whatever the handlers need to render a response
/// that isn't derivable from it, namely the base URL used to build
/// webhook URLs.
#[derive(Clone)]
pub struct AppState {
    pub control: ControlHandle,
    pub base_url: String,
}

/// Assembles the full router (spec.md §6's endpoint table). Grounded on
/// `fourthplaces-mntogether/packages/server/src/server/app.rs`'s
/// `Router::new().route(...)` assembly plus `TraceLayer`/timeout layers.
pub fn build_router(control: ControlHandle, base_url: String) -> Router {
    let state = AppState { control, base_url };

    Router::new()
        .route("/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job).delete(jobs::delete_job))
        .route("/jobs/:id/run", post(jobs::trigger_run))
        .route("/jobs/:id/webhook", post(jobs::regenerate_webhook))
        .route("/jobs/:id/runs", get(jobs::list_runs_for_job))
        .route("/webhooks/:token/trigger", post(webhooks::trigger_by_webhook))
        .route("/runs/:id", get(runs::get_run))
        .route("/runs/:id/pause", post(runs::pause_run))
        .route("/runs/:id/resume", post(runs::resume_run))
        .route("/runs/:id/kill", post(runs::kill_run))
        .route("/runs/:id/logs", get(runs::get_logs))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
