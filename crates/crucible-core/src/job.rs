// SPDX-License-Identifier: MIT

//! Job entity — a reusable container-execution template.

use crate::id::{JobId, OwnerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default resource and timeout values applied when a create-job payload
/// leaves the corresponding field at zero/absent (spec.md §6).
pub const DEFAULT_MEMORY_MB: u32 = 512;
pub const DEFAULT_CPU_MILLICORES: u32 = 1000;
pub const DEFAULT_TIMEOUT_SECONDS: u32 = 3600;

/// A reusable container-execution template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    pub memory_mb: u32,
    pub cpu_millicores: u32,
    pub timeout_seconds: u32,
    pub cron_schedule: Option<String>,
    pub webhook_token: Option<String>,
    pub active: bool,
}

impl Job {
    /// Bytes for the container's memory limit (spec.md §6).
    pub fn memory_bytes(&self) -> i64 {
        i64::from(self.memory_mb) * 1024 * 1024
    }

    /// Nano-CPUs for the container's CPU limit (spec.md §6).
    pub fn nano_cpus(&self) -> i64 {
        i64::from(self.cpu_millicores) * 1_000_000
    }

    /// `None` means "no timeout enforced" (spec.md §3: "0 = none").
    pub fn timeout(&self) -> Option<std::time::Duration> {
        if self.timeout_seconds == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(u64::from(self.timeout_seconds)))
        }
    }
}

/// Fields accepted when creating or updating a job. Zero/absent numeric
/// fields are filled from the spec.md §6 defaults by the caller
/// (`crucible-api`), not silently by this type, so partial updates don't
/// accidentally reset a field to the default.
#[derive(Debug, Clone, Deserialize)]
pub struct JobInput {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub cpu_millicores: Option<u32>,
    #[serde(default)]
    pub timeout_seconds: Option<u32>,
    #[serde(default)]
    pub cron_schedule: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Job {
        Job {
            id: JobId::new(),
            owner_id: OwnerId::new(),
            name: "hello".into(),
            image: "alpine".into(),
            command: vec!["echo".into(), "hi".into()],
            env: HashMap::new(),
            memory_mb: 512,
            cpu_millicores: 1000,
            timeout_seconds: 60,
            cron_schedule: None,
            webhook_token: None,
            active: true,
        }
    }

    #[test]
    fn resource_translation_matches_spec_formula() {
        let job = sample();
        assert_eq!(job.memory_bytes(), 512 * 1024 * 1024);
        assert_eq!(job.nano_cpus(), 1000 * 1_000_000);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let mut job = sample();
        job.timeout_seconds = 0;
        assert_eq!(job.timeout(), None);
    }

    #[test]
    fn nonzero_timeout_is_some_duration() {
        let job = sample();
        assert_eq!(job.timeout(), Some(std::time::Duration::from_secs(60)));
    }
}
