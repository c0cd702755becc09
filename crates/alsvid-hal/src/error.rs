//! Error types for the HAL crate.

use thiserror::Error;

/// Errors that can occur in backend operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Job submission was rejected.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(String),

    /// Job execution reached a permanent failure; carries the backend's
    /// diagnostic payload.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Job id is not known to the backend.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Transient communication failure; safe to retry.
    #[error("Transient backend error: {0}")]
    Transient(String),

    /// Timeout waiting for a job.
    #[error("Timeout waiting for job {0}")]
    Timeout(String),

    /// Backend does not support the requested capability.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Invalid number of shots.
    #[error("Invalid shots: {0}")]
    InvalidShots(String),

    /// Kernel exceeds the backend's qubit budget.
    #[error("Kernel too large: {0}")]
    KernelTooLarge(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Core validation error surfaced through a backend call.
    #[error(transparent)]
    Core(#[from] alsvid_core::CoreError),
}

impl HalError {
    /// Whether retrying the failed call could succeed.
    ///
    /// Only transport-level hiccups qualify; validation errors and
    /// permanent job failures never do.
    pub fn is_transient(&self) -> bool {
        matches!(self, HalError::Transient(_))
    }
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
