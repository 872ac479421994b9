// Service error types

use crate::config::ConfigError;
use crate::execution::runner::RunnerError;
use crate::job::{JobError, StoreError};

use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Any failure surfaced by the engine's top-level operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
