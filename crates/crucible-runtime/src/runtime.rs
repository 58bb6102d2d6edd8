// SPDX-License-Identifier: MIT

//! The container execution substrate (spec.md §4.2). Grounded on
//! `examples/alfredjeanlab-oddjobs/crates/daemon/src/adapters/agent/docker/mod.rs`
//! for the existence and shape of a Docker adapter trait; that adapter
//! shells out to the `docker` CLI, this implementation talks to the
//! Engine API directly through `bollard` instead (see DESIGN.md).

use crate::error::Result;
use crate::spec::{ContainerSpec, ExitStatus};
use async_trait::async_trait;
use std::time::Duration;

/// Cap on how much of a container's log output is retained per run
/// (spec.md §3 "logs_tail... bounded").
pub const LOG_TAIL_CAP_BYTES: usize = 64 * 1024;

/// The sequence of container operations a supervised run drives through
/// (spec.md §4.5). Every method is keyed by engine-assigned container id
/// except `pull`, which is keyed by image, and `create`, which returns one.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn pull(&self, image: &str) -> Result<()>;

    async fn create(&self, spec: &ContainerSpec) -> Result<String>;

    async fn start(&self, container_id: &str) -> Result<()>;

    /// Blocks until the container exits, whether that's because its
    /// command finished or because [`Self::stop`] forced it to.
    async fn wait(&self, container_id: &str) -> Result<ExitStatus>;

    async fn pause(&self, container_id: &str) -> Result<()>;

    async fn unpause(&self, container_id: &str) -> Result<()>;

    /// Sends SIGTERM, then SIGKILL after `grace`.
    async fn stop(&self, container_id: &str, grace: Duration) -> Result<()>;

    async fn remove(&self, container_id: &str) -> Result<()>;

    /// Last [`LOG_TAIL_CAP_BYTES`] bytes of combined stdout/stderr.
    async fn logs_tail(&self, container_id: &str) -> Result<String>;
}
