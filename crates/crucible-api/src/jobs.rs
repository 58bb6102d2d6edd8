// SPDX-License-Identifier: MIT

//! `/jobs` resource handlers (spec.md §6).

use crate::auth::AuthedOwner;
use crate::dto::{CreateJobRequest, WebhookResponse};
use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use crucible_core::JobId;

pub async fn create_job(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Json(body): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<crucible_core::Job>), ApiError> {
    validate(&body)?;
    let job = state.control.create_job(owner_id, body.into()).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
) -> Result<Json<Vec<crucible_core::Job>>, ApiError> {
    Ok(Json(state.control.list_jobs(owner_id).await?))
}

pub async fn get_job(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(job_id): Path<JobId>,
) -> Result<Json<crucible_core::Job>, ApiError> {
    Ok(Json(state.control.get_job(owner_id, job_id).await?))
}

pub async fn delete_job(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(job_id): Path<JobId>,
) -> Result<StatusCode, ApiError> {
    state.control.delete_job(owner_id, job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /jobs/{id}/run` (spec.md §6): inserts a pending run+queue row;
/// the queue-driven worker pool is the only thing that ever starts a
/// container (spec.md §9 Open Question 2 — no inline-trigger shortcut).
pub async fn trigger_run(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(job_id): Path<JobId>,
) -> Result<(StatusCode, Json<crucible_core::Run>), ApiError> {
    let run = state.control.trigger(owner_id, job_id).await?;
    Ok((StatusCode::ACCEPTED, Json(run)))
}

pub async fn regenerate_webhook(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(job_id): Path<JobId>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let token = state.control.regenerate_webhook_token(owner_id, job_id).await?;
    let url = format!("{}/webhooks/{}/trigger", state.base_url, token);
    Ok(Json(WebhookResponse { token, url }))
}

pub async fn list_runs_for_job(
    State(state): State<AppState>,
    AuthedOwner(owner_id): AuthedOwner,
    Path(job_id): Path<JobId>,
) -> Result<Json<Vec<crucible_core::Run>>, ApiError> {
    Ok(Json(state.control.list_runs_for_job(owner_id, job_id).await?))
}

fn validate(req: &CreateJobRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".into()));
    }
    if req.image.trim().is_empty() {
        return Err(ApiError::Validation("image must not be empty".into()));
    }
    if let Some(cron) = &req.cron_schedule {
        if cron.split_whitespace().count() != 5 {
            return Err(ApiError::Validation("cron_schedule must have 5 fields (minute hour dom month dow)".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CreateJobRequest {
        CreateJobRequest {
            name: "hello".into(),
            image: "alpine".into(),
            command: vec![],
            env: Default::default(),
            memory_mb: None,
            cpu_millicores: None,
            timeout_seconds: None,
            cron_schedule: None,
        }
    }

    #[test]
    fn rejects_blank_name() {
        let mut req = sample();
        req.name = "  ".into();
        assert!(validate(&req).is_err());
    }

    #[test]
    fn rejects_malformed_cron() {
        let mut req = sample();
        req.cron_schedule = Some("every day".into());
        assert!(validate(&req).is_err());
    }

    #[test]
    fn accepts_a_well_formed_request() {
        assert!(validate(&sample()).is_ok());
    }
}
