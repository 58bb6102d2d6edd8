// SPDX-License-Identifier: MIT

//! `/webhooks/{token}/trigger` (spec.md §6, §9): unauthenticated by
//! design — the token itself is the capability.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

pub async fn trigger_by_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<(StatusCode, Json<crucible_core::Run>), ApiError> {
    let run = state.control.trigger_by_webhook_token(&token).await?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}
