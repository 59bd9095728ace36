//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::AttemptId;
use storage::repository::StorageError;

/// Errors emitted by exam attempt API clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("exam api request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("exam api returned an unreadable body: {0}")]
    Decode(String),
    #[error("exam api unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors behind the progress store's boolean results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
}

/// Errors emitted by `AttemptRegistry`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt has no exam id")]
    MissingExamId,
    #[error("attempt {active} is already active; finish it before starting another")]
    Conflict {
        active: AttemptId,
        requested: Option<AttemptId>,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while reading `ExamClientConfig` from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be a whole number, got {raw:?}")]
    InvalidNumber { var: &'static str, raw: String },
    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
    #[error("{var} is not a valid url: {raw:?}")]
    InvalidUrl { var: &'static str, raw: String },
}
