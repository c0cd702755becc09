//! Backend capability trait and configuration.
//!
//! The [`QpuBackend`] trait is the seam between the execution layer and a
//! concrete target (local simulator, remote QPU, mock server):
//!
//! ```text
//!   submit(kernel, args, shots) ──→ JobId
//!   poll(job_id)                ──→ Pending | Counts | Error
//!   submit_state(kernel, args)  ──→ QuantumState    (simulators only)
//! ```
//!
//! ## Design principles
//!
//! - **Async-native**: all I/O methods are async.
//! - **Thread-safe**: `Send + Sync` bound enables shared ownership.
//! - **Sync introspection**: `name()`, `supports_statevector()` and
//!   `max_qubits()` must answer without I/O — a backend that cannot is
//!   not correctly initialized.
//! - **Idempotent polling**: `poll()` on a terminal job returns the same
//!   answer every time and never consumes the job; a persisted job handle
//!   can therefore be polled from another process.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use alsvid_core::{Kernel, KernelArg, QuantumState};

use crate::error::HalResult;
use crate::job::{JobId, JobPoll};

/// Configuration for a backend instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Name of the backend.
    pub name: String,
    /// Authentication token, if the target needs one.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Additional configuration.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BackendConfig {
    /// Create a new backend configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Set the authentication token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Add extra configuration.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .field("extra", &self.extra)
            .finish()
    }
}

/// Capability object for a configured quantum target.
///
/// # Contract
///
/// - `submit()` MUST validate shots and kernel size before accepting, and
///   MUST return a job that polls as `Pending` or terminal thereafter.
/// - `poll()` MUST be idempotent; terminal answers are permanent.
/// - `submit_state()` is only meaningful when `supports_statevector()` is
///   true; other targets MUST return `HalError::Unsupported`.
#[async_trait]
pub trait QpuBackend: Send + Sync {
    /// Name of this backend.
    fn name(&self) -> &str;

    /// Whether this target can return the full simulated state.
    fn supports_statevector(&self) -> bool;

    /// Largest kernel register this target accepts.
    fn max_qubits(&self) -> u32;

    /// Submit a kernel for sampled execution.
    async fn submit(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
        shots: u32,
    ) -> HalResult<JobId>;

    /// Poll a job for its current state.
    async fn poll(&self, job_id: &JobId) -> HalResult<JobPoll>;

    /// Execute a kernel and return the resulting quantum state.
    async fn submit_state(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
    ) -> HalResult<QuantumState>;
}
