// SPDX-License-Identifier: MIT

//! `/runs` resource and control-command handlers (spec.md §4.9, §6).

use crate::auth::AuthedOwner;
use crate::dto::LogsResponse;
use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use crucible_core::RunId;

pub async fn get_run(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(run_id): Path<RunId>,
) -> Result<Json<crucible_core::Run>, ApiError> {
    Ok(Json(state.control.get_run(owner_id, run_id).await?))
}

pub async fn pause_run(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(run_id): Path<RunId>,
) -> Result<Json<crucible_core::Run>, ApiError> {
    Ok(Json(state.control.pause(owner_id, run_id).await?))
}

pub async fn resume_run(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(run_id): Path<RunId>,
) -> Result<Json<crucible_core::Run>, ApiError> {
    Ok(Json(state.control.resume(owner_id, run_id).await?))
}

pub async fn kill_run(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(run_id): Path<RunId>,
) -> Result<Json<crucible_core::Run>, ApiError> {
    Ok(Json(state.control.kill(owner_id, run_id).await?))
}

pub async fn get_logs(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(run_id): Path<RunId>,
) -> Result<Json<LogsResponse>, ApiError> {
    let logs = state.control.logs(owner_id, run_id).await?;
    Ok(Json(LogsResponse { logs }))
}
