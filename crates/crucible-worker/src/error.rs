// SPDX-License-Identifier: MIT

use crucible_core::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] crucible_storage::StoreError),
    #[error(transparent)]
    Runtime(#[from] crucible_runtime::RuntimeError),
    #[error(transparent)]
    Transition(#[from] crucible_core::TransitionConflict),
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),
}

impl WorkerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Store(e) => e.kind(),
            WorkerError::Runtime(e) => e.kind(),
            WorkerError::Transition(_) => ErrorKind::Conflict,
            WorkerError::InvalidCron(_) => ErrorKind::Validation,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
