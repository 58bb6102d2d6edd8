// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! crucible-storage: the durable Postgres-backed store (spec.md §4.1).
//!
//! Everything here is a thin, explicit mapping from domain operations to
//! SQL. No retry, caching, or business-rule logic lives in this crate —
//! that belongs in `crucible-worker` and `crucible-api`, which treat
//! [`Store`] as their single source of truth.

mod error;
mod rows;
mod store;

pub use error::{Result, StoreError};
pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::{JobInput, OwnerId};
    use std::collections::HashMap;

    /// Requires a reachable Postgres instance at `DATABASE_URL`; ignored by
    /// default so `cargo test` stays hermetic without Docker/Postgres.
    /// Run with `cargo test -- --ignored` against a scratch database.
    #[tokio::test]
    #[ignore]
    async fn enqueue_then_claim_round_trips() {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
        let store = Store::connect(&database_url, 5).await.expect("connect");
        store.migrate().await.expect("migrate");

        let owner = OwnerId::new();
        let job = store
            .create_job(
                owner,
                JobInput {
                    name: format!("test-job-{}", uuid::Uuid::new_v4()),
                    image: "alpine:latest".into(),
                    command: vec!["echo".into(), "hi".into()],
                    env: HashMap::new(),
                    memory_mb: None,
                    cpu_millicores: None,
                    timeout_seconds: None,
                    cron_schedule: None,
                },
            )
            .await
            .expect("create_job");

        let run = store.enqueue(job.id, owner, 0, chrono::Utc::now()).await.expect("enqueue");
        assert_eq!(run.status, crucible_core::RunStatus::Pending);

        let claimed = store.claim().await.expect("claim").expect("a row was queued");
        assert_eq!(claimed.run.id, run.id);
        assert_eq!(claimed.job.id, job.id);

        store.cleanup_queue(claimed.queue_id).await.expect("cleanup_queue");
        let second = store.claim().await.expect("claim");
        assert!(second.is_none());
    }
}
