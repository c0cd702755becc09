//! Local statevector simulator backend for the Alsvid runtime.
//!
//! Implements [`QpuBackend`](alsvid_hal::QpuBackend) on top of a dense
//! statevector engine: kernels execute eagerly at submit time and results
//! are served through the standard poll interface, so the execution layer
//! sees the same lifecycle a remote target would give it.
//!
//! # Example
//!
//! ```ignore
//! use alsvid_adapter_sim::SimulatorBackend;
//! use alsvid_core::Kernel;
//! use alsvid_hal::{JobPoll, QpuBackend};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let backend = SimulatorBackend::new();
//! let kernel = Kernel::bell()?;
//!
//! let job_id = backend.submit(&kernel, &[], 1000).await?;
//! if let JobPoll::Counts(counts) = backend.poll(&job_id).await? {
//!     println!("{:?}", counts.most_frequent());
//! }
//! # Ok(())
//! # }
//! ```

pub mod simulator;
pub mod statevector;

pub use simulator::SimulatorBackend;
pub use statevector::Statevector;
