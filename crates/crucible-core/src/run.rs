// SPDX-License-Identifier: MIT

//! Run entity and its state machine.

use crate::id::{JobId, OwnerId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a run. `Succeeded`/`Failed`/`Cancelled` are terminal:
/// no transition leaves them once entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled)
    }

    /// Parse the Postgres `run_status` enum label.
    pub fn from_db(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => RunStatus::Pending,
            "running" => RunStatus::Running,
            "paused" => RunStatus::Paused,
            "succeeded" => RunStatus::Succeeded,
            "failed" => RunStatus::Failed,
            "cancelled" => RunStatus::Cancelled,
            _ => return None,
        })
    }
}

crate::simple_display! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Succeeded => "succeeded",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// One execution attempt of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub job_id: JobId,
    pub owner_id: OwnerId,
    pub status: RunStatus,
    pub container_id: Option<String>,
    pub exit_code: Option<i32>,
    pub error_message: Option<String>,
    pub logs_tail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl Run {
    /// A fresh run, as created by a trigger (spec.md §4.4 Enqueue).
    pub fn pending(job_id: JobId, owner_id: OwnerId, now: DateTime<Utc>) -> Self {
        Self {
            id: RunId::new(),
            job_id,
            owner_id,
            status: RunStatus::Pending,
            container_id: None,
            exit_code: None,
            error_message: None,
            logs_tail: None,
            created_at: now,
            started_at: None,
            paused_at: None,
            finished_at: None,
            heartbeat_at: None,
            duration_ms: None,
        }
    }
}

/// The outcome a supervised run terminates with (spec.md §4.5 step 11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Succeeded,
    Failed { error: String, exit_code: Option<i32> },
    Cancelled { error: String },
}

impl Termination {
    pub fn status(&self) -> RunStatus {
        match self {
            Termination::Succeeded => RunStatus::Succeeded,
            Termination::Failed { .. } => RunStatus::Failed,
            Termination::Cancelled { .. } => RunStatus::Cancelled,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Termination::Succeeded => None,
            Termination::Failed { error, .. } => Some(error),
            Termination::Cancelled { error } => Some(error),
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Termination::Succeeded => Some(0),
            Termination::Failed { exit_code, .. } => *exit_code,
            Termination::Cancelled { .. } => None,
        }
    }
}

/// A command (trigger/pause/resume/kill) attempted on a run that does not
/// satisfy the transition's precondition (spec.md §4.9).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition: run is {from}, command requires {requires}")]
pub struct TransitionConflict {
    pub from: RunStatus,
    pub requires: &'static str,
}

/// Guard for `pause`: only a running run with a container can be paused.
pub fn guard_pause(run: &Run) -> Result<(), TransitionConflict> {
    if run.status == RunStatus::Running && run.container_id.is_some() {
        Ok(())
    } else {
        Err(TransitionConflict { from: run.status, requires: "running" })
    }
}

/// Guard for `resume`: only a paused run can be resumed.
pub fn guard_resume(run: &Run) -> Result<(), TransitionConflict> {
    if run.status == RunStatus::Paused && run.container_id.is_some() {
        Ok(())
    } else {
        Err(TransitionConflict { from: run.status, requires: "paused" })
    }
}

/// Guard for `kill`: running or paused runs can be killed.
pub fn guard_kill(run: &Run) -> Result<(), TransitionConflict> {
    if matches!(run.status, RunStatus::Running | RunStatus::Paused) {
        Ok(())
    } else {
        Err(TransitionConflict { from: run.status, requires: "running or paused" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status: RunStatus, container: Option<&str>) -> Run {
        let now = Utc::now();
        let mut run = Run::pending(JobId::new(), OwnerId::new(), now);
        run.status = status;
        run.container_id = container.map(str::to_string);
        run
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Paused.is_terminal());
    }

    #[test]
    fn pause_requires_running_with_container() {
        assert!(guard_pause(&sample(RunStatus::Running, Some("c1"))).is_ok());
        assert!(guard_pause(&sample(RunStatus::Running, None)).is_err());
        assert!(guard_pause(&sample(RunStatus::Paused, Some("c1"))).is_err());
    }

    #[test]
    fn resume_requires_paused_with_container() {
        assert!(guard_resume(&sample(RunStatus::Paused, Some("c1"))).is_ok());
        assert!(guard_resume(&sample(RunStatus::Running, Some("c1"))).is_err());
    }

    #[test]
    fn kill_allows_running_or_paused() {
        assert!(guard_kill(&sample(RunStatus::Running, Some("c1"))).is_ok());
        assert!(guard_kill(&sample(RunStatus::Paused, Some("c1"))).is_ok());
        assert!(guard_kill(&sample(RunStatus::Succeeded, Some("c1"))).is_err());
    }

    #[test]
    fn termination_exit_codes() {
        assert_eq!(Termination::Succeeded.exit_code(), Some(0));
        assert_eq!(
            Termination::Failed { error: "exit code 7".into(), exit_code: Some(7) }.exit_code(),
            Some(7)
        );
        assert_eq!(
            Termination::Cancelled { error: "killed by user".into() }.exit_code(),
            None
        );
    }
}
