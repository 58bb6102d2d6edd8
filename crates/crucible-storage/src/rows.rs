// SPDX-License-Identifier: MIT

//! `sqlx::FromRow` row types and their conversion into `crucible-core`
//! domain types. Kept separate from the query methods so the "how do I
//! read this table" concern doesn't get lost among the transactions.

use crucible_core::{Job, JobId, OwnerId, QueueRow, Run, RunId, RunStatus};
use sqlx::types::Json;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub image: String,
    pub command: Json<Vec<String>>,
    pub env: Json<HashMap<String, String>>,
    pub memory_mb: i32,
    pub cpu_millicores: i32,
    pub timeout_seconds: i32,
    pub cron_schedule: Option<String>,
    pub webhook_token: Option<String>,
    pub active: bool,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        Job {
            id: JobId::from_uuid(row.id),
            owner_id: OwnerId::from_uuid(row.owner_id),
            name: row.name,
            image: row.image,
            command: row.command.0,
            env: row.env.0,
            memory_mb: row.memory_mb as u32,
            cpu_millicores: row.cpu_millicores as u32,
            timeout_seconds: row.timeout_seconds as u32,
            cron_schedule: row.cron_schedule,
            webhook_token: row.webhook_token,
            active: row.active,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RunRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub owner_id: Uuid,
    pub status: String,
    pub container_id: Option<String>,
    pub exit_code: Option<i32>,
    pub error_message: Option<String>,
    pub logs_tail: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub paused_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub heartbeat_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_ms: Option<i64>,
}

impl From<RunRow> for Run {
    fn from(row: RunRow) -> Self {
        Run {
            id: RunId::from_uuid(row.id),
            job_id: JobId::from_uuid(row.job_id),
            owner_id: OwnerId::from_uuid(row.owner_id),
            status: RunStatus::from_db(&row.status).unwrap_or(RunStatus::Failed),
            container_id: row.container_id,
            exit_code: row.exit_code,
            error_message: row.error_message,
            logs_tail: row.logs_tail,
            created_at: row.created_at,
            started_at: row.started_at,
            paused_at: row.paused_at,
            finished_at: row.finished_at,
            heartbeat_at: row.heartbeat_at,
            duration_ms: row.duration_ms,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct QueueRowSql {
    pub id: Uuid,
    pub job_id: Uuid,
    pub run_id: Uuid,
    pub priority: i32,
    pub scheduled_at: chrono::DateTime<chrono::Utc>,
    pub picked_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<QueueRowSql> for QueueRow {
    fn from(row: QueueRowSql) -> Self {
        QueueRow {
            id: crucible_core::QueueId::from_uuid(row.id),
            job_id: JobId::from_uuid(row.job_id),
            run_id: RunId::from_uuid(row.run_id),
            priority: row.priority,
            scheduled_at: row.scheduled_at,
            picked_at: row.picked_at,
            created_at: row.created_at,
        }
    }
}
