// SPDX-License-Identifier: MIT

//! Per-run liveness stamping (spec.md §4.6). One of these loops runs
//! alongside every supervised container for as long as it's running or
//! paused; the reaper (`crate::reaper`) is the other half of this
//! contract.

use crucible_core::RunId;
use crucible_storage::Store;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

pub async fn run_heartbeat_loop(store: Store, run_id: RunId, interval: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {
                match store.heartbeat(run_id, chrono::Utc::now()).await {
                    Ok(true) => trace!(run_id = %run_id, "heartbeat"),
                    Ok(false) => {
                        // The run already reached a terminal state (finished
                        // naturally or was killed); nothing left to stamp.
                        return;
                    }
                    Err(e) => warn!(run_id = %run_id, error = %e, "heartbeat write failed"),
                }
            }
        }
    }
}

