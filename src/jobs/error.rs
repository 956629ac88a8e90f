//! Error types for job submission and tracking.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Problems found in a [`super::JobRequest`] before anything is sent.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// A required field is empty or out of range.
    #[error("invalid job request: {0}")]
    Validation(String),
    /// The payload file, directory, or entrypoint is unusable.
    #[error("invalid payload {path}: {reason}")]
    InvalidPayload {
        /// Offending path.
        path: Utf8PathBuf,
        /// Why it was rejected.
        reason: String,
    },
}

/// Raised when a directory payload cannot be copied into its staging area.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to stage {path}: {message}")]
pub struct StagingError {
    /// Path being copied.
    pub path: Utf8PathBuf,
    /// Underlying I/O error text.
    pub message: String,
}

/// Errors surfaced by the job submitter and tracker.
#[derive(Debug, Error)]
pub enum JobError<E>
where
    E: std::error::Error + 'static,
{
    /// A required field is empty or out of range.
    #[error("invalid job request: {0}")]
    Validation(String),
    /// The payload file, directory, or entrypoint is unusable.
    #[error("invalid payload {path}: {reason}")]
    InvalidPayload {
        /// Offending path.
        path: Utf8PathBuf,
        /// Why it was rejected.
        reason: String,
    },
    /// The payload could not be copied locally before upload.
    #[error(transparent)]
    Staging(#[from] StagingError),
    /// The platform rejected or failed a request.
    #[error("platform request failed: {0}")]
    Platform(#[source] E),
}

impl<E> From<RequestError> for JobError<E>
where
    E: std::error::Error + 'static,
{
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::Validation(message) => Self::Validation(message),
            RequestError::InvalidPayload { path, reason } => Self::InvalidPayload { path, reason },
        }
    }
}
