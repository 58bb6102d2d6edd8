// SPDX-License-Identifier: MIT

//! Request/response bodies that aren't just a domain type reused as-is.

use serde::{Deserialize, Serialize};

/// `POST /jobs` body. Mirrors [`crucible_core::JobInput`] field-for-field;
/// kept as a separate type so the wire shape doesn't silently change if
/// the domain type grows fields that shouldn't be caller-settable.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub cpu_millicores: Option<u32>,
    #[serde(default)]
    pub timeout_seconds: Option<u32>,
    #[serde(default)]
    pub cron_schedule: Option<String>,
}

impl From<CreateJobRequest> for crucible_core::JobInput {
    fn from(req: CreateJobRequest) -> Self {
        crucible_core::JobInput {
            name: req.name,
            image: req.image,
            command: req.command,
            env: req.env,
            memory_mb: req.memory_mb,
            cpu_millicores: req.cpu_millicores,
            timeout_seconds: req.timeout_seconds,
            cron_schedule: req.cron_schedule,
        }
    }
}

/// `POST /jobs/{id}/webhook` response (spec.md §6): the regenerated
/// capability token plus the full URL a caller would hit.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub token: String,
    pub url: String,
}

/// `GET /runs/{id}/logs` response.
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: String,
}
