// SPDX-License-Identifier: MIT

//! Inputs and outputs of the container lifecycle, independent of whichever
//! engine backs [`crate::ContainerRuntime`].

use std::collections::HashMap;

/// Everything the runtime needs to create a container for one run
/// (spec.md §4.2, resource translation per spec.md §6).
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    pub memory_bytes: i64,
    pub nano_cpus: i64,
}

/// Why a supervised container stopped running (spec.md §4.5 step 9-11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i64),
    /// The engine reported the wait as an error rather than an exit code
    /// (e.g. the container vanished out from under us).
    Unknown,
}

impl ExitStatus {
    pub fn is_success(self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }

    pub fn code(self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(code as i32),
            ExitStatus::Unknown => None,
        }
    }
}
