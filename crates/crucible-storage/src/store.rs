// SPDX-License-Identifier: MIT

//! The transactional Postgres store (spec.md §4.1).
//!
//! Skip-locked claim grounded on
//! `examples/other_examples/0d5ffb40_crcn-seesaw-rs__crates-seesaw-job-postgres-src-lib.rs.rs`;
//! row mapping grounded on
//! `examples/fourthplaces-mntogether/packages/server/src/kernel/job_queue.rs`'s
//! `sqlx::query_as::<_, T>` idiom.

use crate::error::{Result, StoreError};
use crate::rows::{JobRow, QueueRowSql, RunRow};
use chrono::{DateTime, Utc};
use crucible_core::{ClaimedRun, Job, JobId, JobInput, OwnerId, QueueId, QueueRow, Run, RunId, Termination};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // ---- Jobs -----------------------------------------------------------

    pub async fn create_job(&self, owner_id: OwnerId, input: JobInput) -> Result<Job> {
        use crucible_core::job::{DEFAULT_CPU_MILLICORES, DEFAULT_MEMORY_MB, DEFAULT_TIMEOUT_SECONDS};

        let id = Uuid::new_v4();
        let memory_mb = input.memory_mb.filter(|v| *v != 0).unwrap_or(DEFAULT_MEMORY_MB);
        let cpu_millicores = input.cpu_millicores.filter(|v| *v != 0).unwrap_or(DEFAULT_CPU_MILLICORES);
        let timeout_seconds = input.timeout_seconds.filter(|v| *v != 0).unwrap_or(DEFAULT_TIMEOUT_SECONDS);

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (id, owner_id, name, image, command, env, memory_mb, cpu_millicores, timeout_seconds, cron_schedule, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE)
            RETURNING id, owner_id, name, image, command, env, memory_mb, cpu_millicores, timeout_seconds, cron_schedule, webhook_token, active
            "#,
        )
        .bind(id)
        .bind(owner_id.as_uuid())
        .bind(&input.name)
        .bind(&input.image)
        .bind(Json(&input.command))
        .bind(Json(&input.env))
        .bind(memory_mb as i32)
        .bind(cpu_millicores as i32)
        .bind(timeout_seconds as i32)
        .bind(&input.cron_schedule)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    pub async fn get_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, owner_id, name, image, command, env, memory_mb, cpu_millicores, timeout_seconds, cron_schedule, webhook_token, active
            FROM jobs WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(row.into())
    }

    pub async fn list_jobs(&self, owner_id: OwnerId) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, owner_id, name, image, command, env, memory_mb, cpu_millicores, timeout_seconds, cron_schedule, webhook_token, active
            FROM jobs WHERE owner_id = $1 ORDER BY name ASC
            "#,
        )
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Deletion cascades to runs and queue rows via `ON DELETE CASCADE`
    /// (spec.md §3 invariants).
    pub async fn delete_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND owner_id = $2")
            .bind(job_id.as_uuid())
            .bind(owner_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Generate and persist a new webhook token, invalidating the previous
    /// one (spec.md §9 "Regenerating it invalidates the previous URL").
    pub async fn regenerate_webhook_token(&self, owner_id: OwnerId, job_id: JobId) -> Result<String> {
        let token = format!("whk_{}", hex::encode(rand_bytes::<32>()));

        let result = sqlx::query("UPDATE jobs SET webhook_token = $1, updated_at = now() WHERE id = $2 AND owner_id = $3")
            .bind(&token)
            .bind(job_id.as_uuid())
            .bind(owner_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(token)
    }

    pub async fn find_job_by_webhook_token(&self, token: &str) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, owner_id, name, image, command, env, memory_mb, cpu_millicores, timeout_seconds, cron_schedule, webhook_token, active
            FROM jobs WHERE webhook_token = $1 AND active
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(row.into())
    }

    pub async fn list_active_cron_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, owner_id, name, image, command, env, memory_mb, cpu_millicores, timeout_seconds, cron_schedule, webhook_token, active
            FROM jobs WHERE active AND cron_schedule IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ---- Runs -------------------------------------------------------------

    pub async fn get_run(&self, owner_id: OwnerId, run_id: RunId) -> Result<Run> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, job_id, owner_id, status::text AS status, container_id, exit_code, error_message,
                   logs_tail, created_at, started_at, paused_at, finished_at, heartbeat_at, duration_ms
            FROM job_runs WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Ok(row.into())
    }

    /// Newest-first, capped at 50 (spec.md §6).
    pub async fn list_runs_for_job(&self, owner_id: OwnerId, job_id: JobId) -> Result<Vec<Run>> {
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, job_id, owner_id, status::text AS status, container_id, exit_code, error_message,
                   logs_tail, created_at, started_at, paused_at, finished_at, heartbeat_at, duration_ms
            FROM job_runs WHERE job_id = $1 AND owner_id = $2
            ORDER BY created_at DESC LIMIT 50
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Count of non-terminal runs for a job (spec.md §4.8 step 2).
    pub async fn count_nonterminal_runs(&self, job_id: JobId) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM job_runs WHERE job_id = $1 AND status IN ('pending', 'running', 'paused')",
        )
        .bind(job_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// `created_at` of the most recent run of any status (spec.md §4.8 step 3).
    pub async fn most_recent_run_created_at(&self, job_id: JobId) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT created_at FROM job_runs WHERE job_id = $1 ORDER BY created_at DESC LIMIT 1")
                .bind(job_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(t,)| t))
    }

    // ---- Queue & claim ------------------------------------------------------

    /// Creates a pending run and its queue row in one transaction
    /// (spec.md §4.4 Enqueue).
    pub async fn enqueue(&self, job_id: JobId, owner_id: OwnerId, priority: i32, scheduled_at: DateTime<Utc>) -> Result<Run> {
        let mut tx = self.pool.begin().await?;

        let run_id = Uuid::new_v4();
        let run_row = sqlx::query_as::<_, RunRow>(
            r#"
            INSERT INTO job_runs (id, job_id, owner_id, status, created_at)
            VALUES ($1, $2, $3, 'pending', now())
            RETURNING id, job_id, owner_id, status::text AS status, container_id, exit_code, error_message,
                      logs_tail, created_at, started_at, paused_at, finished_at, heartbeat_at, duration_ms
            "#,
        )
        .bind(run_id)
        .bind(job_id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO job_queue (id, job_id, run_id, priority, scheduled_at, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id.as_uuid())
        .bind(run_id)
        .bind(priority)
        .bind(scheduled_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(run_row.into())
    }

    /// Atomically claim the oldest-highest-priority claimable queue row and
    /// return the joined job+run payload (spec.md §4.4 Claim). Returns
    /// `Ok(None)` when the queue is empty, distinguishable from an error.
    pub async fn claim(&self) -> Result<Option<ClaimedRun>> {
        let mut tx = self.pool.begin().await?;

        // `FOR UPDATE SKIP LOCKED` means a concurrent worker's in-flight
        // claim transaction is invisible to this one; no two workers ever
        // pick the same row (spec.md §4.4, §5).
        let claimed: Option<QueueRowSql> = sqlx::query_as(
            r#"
            WITH claimable AS (
                SELECT id
                FROM job_queue
                WHERE picked_at IS NULL AND scheduled_at <= now()
                ORDER BY priority DESC, scheduled_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE job_queue
            SET picked_at = now()
            WHERE id IN (SELECT id FROM claimable)
            RETURNING id, job_id, run_id, priority, scheduled_at, picked_at, created_at
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(queue_row) = claimed else {
            tx.rollback().await?;
            return Ok(None);
        };

        let job_row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, owner_id, name, image, command, env, memory_mb, cpu_millicores, timeout_seconds, cron_schedule, webhook_token, active
            FROM jobs WHERE id = $1
            "#,
        )
        .bind(queue_row.job_id)
        .fetch_one(&mut *tx)
        .await?;

        let run_row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, job_id, owner_id, status::text AS status, container_id, exit_code, error_message,
                   logs_tail, created_at, started_at, paused_at, finished_at, heartbeat_at, duration_ms
            FROM job_runs WHERE id = $1
            "#,
        )
        .bind(queue_row.run_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let queue_row: QueueRow = queue_row.into();
        Ok(Some(ClaimedRun { queue_id: queue_row.id, job: job_row.into(), run: run_row.into() }))
    }

    /// Unconditional delete, called exactly once per claim regardless of
    /// outcome (spec.md §4.4 Cleanup).
    pub async fn cleanup_queue(&self, queue_id: QueueId) -> Result<()> {
        sqlx::query("DELETE FROM job_queue WHERE id = $1").bind(queue_id.as_uuid()).execute(&self.pool).await?;
        Ok(())
    }

    /// Deletes the queue row for a run, if any (used by the reaper and by
    /// kill). Best-effort in the sense that a missing row is not an error.
    pub async fn delete_queue_row_for_run(&self, run_id: RunId) -> Result<()> {
        sqlx::query("DELETE FROM job_queue WHERE run_id = $1").bind(run_id.as_uuid()).execute(&self.pool).await?;
        Ok(())
    }

    /// Startup reconciliation half of spec.md §9's open question: delete
    /// queue rows whose run is already terminal (the other half — the
    /// reaper deleting the row when it fails a run — lives in
    /// `crucible-worker`).
    pub async fn cleanup_terminal_queue_rows(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM job_queue
            WHERE run_id IN (SELECT id FROM job_runs WHERE status IN ('succeeded', 'failed', 'cancelled'))
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ---- Run lifecycle, written by the worker pool ------------------------

    /// `pending` → `running` (spec.md §4.5 step 1). Conditional on the run
    /// still being pending so a claim can never double-start a run.
    pub async fn mark_running(&self, run_id: RunId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE job_runs SET status = 'running', started_at = $2, heartbeat_at = $2 WHERE id = $1 AND status = 'pending'",
        )
        .bind(run_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Persist the container id once it's known (spec.md §4.5 step 5,
    /// §3 invariant "set at most once").
    pub async fn set_container_id(&self, run_id: RunId, container_id: &str) -> Result<()> {
        sqlx::query("UPDATE job_runs SET container_id = $2 WHERE id = $1 AND container_id IS NULL")
            .bind(run_id.as_uuid())
            .bind(container_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Conditional heartbeat stamp; never resurrects a terminated run
    /// (spec.md §4.6).
    pub async fn heartbeat(&self, run_id: RunId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE job_runs SET heartbeat_at = $2 WHERE id = $1 AND status IN ('running', 'paused')")
            .bind(run_id.as_uuid())
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Fail a run still in `pending` (pre-exec failure: pull/create/start;
    /// spec.md §4.3, §4.5 steps 3/4/7).
    pub async fn fail_pending(&self, run_id: RunId, error: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job_runs
            SET status = 'failed', error_message = $2, finished_at = $3, heartbeat_at = NULL
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Final terminal write (spec.md §4.5 step 12). Conditional on the run
    /// still being `running` or `paused` so a concurrent kill's write wins
    /// if it landed first (spec.md §4.9, §8 property 7). Returns whether
    /// this write actually took effect.
    #[allow(clippy::too_many_arguments)]
    pub async fn finalize(
        &self,
        run_id: RunId,
        termination: &Termination,
        logs_tail: Option<&str>,
        finished_at: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<bool> {
        let status = termination.status();
        let result = sqlx::query(
            r#"
            UPDATE job_runs
            SET status = $2::run_status, exit_code = $3, error_message = $4, logs_tail = $5,
                finished_at = $6, duration_ms = $7, heartbeat_at = NULL
            WHERE id = $1 AND status IN ('running', 'paused')
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(status.to_string())
        .bind(termination.exit_code())
        .bind(termination.error_message())
        .bind(logs_tail)
        .bind(finished_at)
        .bind(duration_ms)
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() == 1;
        if !applied {
            warn!(run_id = %run_id, "final write lost the race (run already terminal)");
        }
        Ok(applied)
    }

    // ---- Control commands (spec.md §4.9) -----------------------------------

    pub async fn pause(&self, owner_id: OwnerId, run_id: RunId, now: DateTime<Utc>) -> Result<Run> {
        let mut tx = self.pool.begin().await?;
        let run = self.lock_run(&mut tx, owner_id, run_id).await?;
        crucible_core::guard_pause(&run).map_err(|e| StoreError::Conflict(e.to_string()))?;

        let row = sqlx::query_as::<_, RunRow>(
            r#"
            UPDATE job_runs SET status = 'paused', paused_at = $2 WHERE id = $1
            RETURNING id, job_id, owner_id, status::text AS status, container_id, exit_code, error_message,
                      logs_tail, created_at, started_at, paused_at, finished_at, heartbeat_at, duration_ms
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    pub async fn resume(&self, owner_id: OwnerId, run_id: RunId) -> Result<Run> {
        let mut tx = self.pool.begin().await?;
        let run = self.lock_run(&mut tx, owner_id, run_id).await?;
        crucible_core::guard_resume(&run).map_err(|e| StoreError::Conflict(e.to_string()))?;

        let row = sqlx::query_as::<_, RunRow>(
            r#"
            UPDATE job_runs SET status = 'running', paused_at = NULL WHERE id = $1
            RETURNING id, job_id, owner_id, status::text AS status, container_id, exit_code, error_message,
                      logs_tail, created_at, started_at, paused_at, finished_at, heartbeat_at, duration_ms
            "#,
        )
        .bind(run_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    /// Transitions the run to `cancelled`. The caller is responsible for
    /// stopping/removing the container before or after this write; the
    /// conditional guard here only protects against a concurrent
    /// supervisor terminal write (spec.md §4.9 "first writer wins").
    pub async fn kill(&self, owner_id: OwnerId, run_id: RunId, now: DateTime<Utc>) -> Result<Run> {
        let mut tx = self.pool.begin().await?;
        let run = self.lock_run(&mut tx, owner_id, run_id).await?;
        crucible_core::guard_kill(&run).map_err(|e| StoreError::Conflict(e.to_string()))?;

        let duration_ms = run.started_at.map(|s| (now - s).num_milliseconds());
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            UPDATE job_runs
            SET status = 'cancelled', error_message = 'killed by user', finished_at = $2,
                duration_ms = $3, heartbeat_at = NULL
            WHERE id = $1
            RETURNING id, job_id, owner_id, status::text AS status, container_id, exit_code, error_message,
                      logs_tail, created_at, started_at, paused_at, finished_at, heartbeat_at, duration_ms
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(now)
        .bind(duration_ms)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn lock_run(&self, tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, owner_id: OwnerId, run_id: RunId) -> Result<Run> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, job_id, owner_id, status::text AS status, container_id, exit_code, error_message,
                   logs_tail, created_at, started_at, paused_at, finished_at, heartbeat_at, duration_ms
            FROM job_runs WHERE id = $1 AND owner_id = $2 FOR UPDATE
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(row.into())
    }

    // ---- Reaper (spec.md §4.7) ---------------------------------------------

    /// Runs whose heartbeat hasn't been stamped within `stale_threshold`.
    pub async fn stale_runs(&self, stale_threshold: chrono::Duration) -> Result<Vec<Run>> {
        let cutoff = Utc::now() - stale_threshold;
        let rows = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, job_id, owner_id, status::text AS status, container_id, exit_code, error_message,
                   logs_tail, created_at, started_at, paused_at, finished_at, heartbeat_at, duration_ms
            FROM job_runs
            WHERE status IN ('running', 'paused') AND heartbeat_at < $1
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Force a stale run to `failed` (spec.md §4.7 step 2). Conditional so
    /// a run that resolved naturally between the reaper's scan and this
    /// write is left untouched.
    pub async fn reaper_fail(&self, run_id: RunId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE job_runs
            SET status = 'failed', error_message = 'heartbeat timeout: worker may have crashed',
                finished_at = $2, heartbeat_at = NULL
            WHERE id = $1 AND status IN ('running', 'paused')
            "#,
        )
        .bind(run_id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn rand_bytes<const N: usize>() -> [u8; N] {
    use rand::RngCore;
    let mut buf = [0u8; N];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}
