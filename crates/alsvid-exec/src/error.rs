//! Error types for the execution crate.

use std::time::Duration;

use thiserror::Error;

use alsvid_core::{CoreError, ObserveResult};
use alsvid_hal::HalError;

/// One Hamiltonian term whose job permanently failed.
#[derive(Debug, Clone)]
pub struct TermFailure {
    /// Index of the term in the Hamiltonian.
    pub term_index: usize,
    /// The failed backend job.
    pub job_id: String,
    /// The backend's diagnostic payload.
    pub diagnostic: String,
}

/// Errors that can occur while dispatching and collecting kernel results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecError {
    /// Backend-layer error.
    #[error(transparent)]
    Hal(#[from] HalError),

    /// Core validation error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A dispatched job reached a permanent failure.
    #[error("Job {job_id} failed: {diagnostic}")]
    JobFailed {
        /// The failed backend job.
        job_id: String,
        /// The backend's diagnostic payload.
        diagnostic: String,
    },

    /// One or more Hamiltonian term jobs permanently failed.
    ///
    /// Completed terms' expectations are preserved in `partial` and remain
    /// queryable; only the listed terms are missing.
    #[error("{} Hamiltonian term job(s) failed, first: term {} ({})", failures.len(), failures[0].term_index, failures[0].diagnostic)]
    TermsFailed {
        /// The failed terms, in term order.
        failures: Vec<TermFailure>,
        /// The partially-filled result with completed terms recorded.
        partial: Box<ObserveResult>,
    },

    /// Caller-specified wait exceeded.
    ///
    /// The future stays valid: polling is idempotent and a later `get`
    /// can still succeed.
    #[error("Timed out after {waited:?} waiting for job results")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
    },

    /// A persisted future blob failed to reconstruct.
    #[error("Invalid serialized future: {0}")]
    FutureFormat(String),
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
