//! Alsvid backend capability layer.
//!
//! This crate defines the contract between the execution runtime and a
//! concrete quantum target:
//!
//! - The [`QpuBackend`] trait — submit a kernel, poll a job, optionally
//!   extract the simulated state.
//! - [`JobId`] / [`JobStatus`] / [`JobPoll`] — the job lifecycle types.
//! - [`RetryPolicy`] — bounded exponential backoff over transient
//!   communication failures.
//!
//! Target-specific crates (`alsvid-adapter-*`) implement [`QpuBackend`];
//! everything above this layer treats a backend as an opaque capability
//! object and never sees vendor detail.
//!
//! # Example: implementing a backend
//!
//! ```ignore
//! use alsvid_core::{Kernel, KernelArg, QuantumState};
//! use alsvid_hal::{HalError, HalResult, JobId, JobPoll, QpuBackend};
//! use async_trait::async_trait;
//!
//! struct MyBackend;
//!
//! #[async_trait]
//! impl QpuBackend for MyBackend {
//!     fn name(&self) -> &str { "my_backend" }
//!     fn supports_statevector(&self) -> bool { false }
//!     fn max_qubits(&self) -> u32 { 32 }
//!
//!     async fn submit(&self, kernel: &Kernel, args: &[KernelArg], shots: u32) -> HalResult<JobId> {
//!         // Hand the kernel to the remote queue.
//!         # todo!()
//!     }
//!
//!     async fn poll(&self, job_id: &JobId) -> HalResult<JobPoll> {
//!         // Query the remote queue.
//!         # todo!()
//!     }
//!
//!     async fn submit_state(&self, _: &Kernel, _: &[KernelArg]) -> HalResult<QuantumState> {
//!         Err(HalError::Unsupported("physical targets cannot return a state".into()))
//!     }
//! }
//! ```

pub mod backend;
pub mod error;
pub mod job;
pub mod retry;

pub use backend::{BackendConfig, QpuBackend};
pub use error::{HalError, HalResult};
pub use job::{Job, JobId, JobPoll, JobStatus};
pub use retry::RetryPolicy;
