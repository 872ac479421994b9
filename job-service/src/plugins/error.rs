// Plugin error types

use crate::expression::InterpolationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("transport already disconnected")]
    Disconnected,

    #[error("command timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("failed to acquire build host: {0}")]
    Acquire(String),

    #[error("failed to release build host: {0}")]
    Release(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("required package not available: {0}")]
    MissingPackage(String),

    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source is missing '{0}'")]
    MissingField(&'static str),

    #[error("{0}")]
    Interpolation(#[from] InterpolationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("invalid arguments for '{action}': {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("action used before prepare")]
    NotPrepared,

    #[error("{0}")]
    Interpolation(#[from] InterpolationError),

    #[error("could not read report: {0}")]
    Report(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ActionError {
    pub fn invalid(action: &str, err: impl std::fmt::Display) -> Self {
        ActionError::InvalidArguments {
            action: action.to_string(),
            reason: err.to_string(),
        }
    }
}
