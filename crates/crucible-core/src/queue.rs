// SPDX-License-Identifier: MIT

//! Queue row entity — a durable marker that a run is pending execution.

use crate::id::{JobId, QueueId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A work-to-do marker, inserted alongside a pending run and deleted once
/// the run reaches a terminal state (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRow {
    pub id: QueueId,
    pub job_id: JobId,
    pub run_id: RunId,
    pub priority: i32,
    pub scheduled_at: DateTime<Utc>,
    pub picked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A claimed queue row joined with the job and run it references — the
/// payload `Claim()` hands to the worker pool (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct ClaimedRun {
    pub queue_id: QueueId,
    pub job: crate::job::Job,
    pub run: crate::run::Run,
}
