// SPDX-License-Identifier: MIT

use crucible_core::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("image pull failed: {0}")]
    Pull(String),
    #[error("container create failed: {0}")]
    Create(String),
    #[error("container start failed: {0}")]
    Start(String),
    #[error("container wait failed: {0}")]
    Wait(String),
    #[error("container control ({op}) failed: {source}")]
    Control { op: &'static str, source: bollard::errors::Error },
    #[error("container not found: {0}")]
    NotFound(String),
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
