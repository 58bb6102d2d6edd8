// SPDX-License-Identifier: MIT

//! Shared error taxonomy (spec.md §7), independent of any particular
//! storage or transport crate so both `crucible-storage` and
//! `crucible-api` can map into it.

use serde::Serialize;

/// A caller-facing error category. Transport crates translate these into
/// status codes / exit codes; this crate only names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input, missing required fields, bad ids.
    Validation,
    /// Entity doesn't exist or isn't owned by the caller (uniform, to
    /// avoid leaking existence).
    NotFound,
    /// Precondition failed (pause on a non-running run, etc).
    Conflict,
    /// Something failed inside the service itself.
    Internal,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}
