//! Alsvid execution layer.
//!
//! Dispatches kernels against a configured [`QpuBackend`](alsvid_hal::QpuBackend)
//! and manages the resulting jobs:
//!
//! - [`ExecutionDispatcher`] — synchronous and asynchronous `sample` /
//!   `observe` / `get_state` entry points with per-term Hamiltonian
//!   fan-out and transparent retry of transient backend failures.
//! - [`AsyncSampleResult`] / [`AsyncObserveResult`] — durable, pollable,
//!   serializable job handles for fire-now-collect-later workflows.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use alsvid_adapter_sim::SimulatorBackend;
//! use alsvid_core::Kernel;
//! use alsvid_exec::ExecutionDispatcher;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let dispatcher = ExecutionDispatcher::new(Arc::new(SimulatorBackend::new()));
//! let result = dispatcher.sample(&Kernel::bell()?, &[], 1000).await?;
//! assert_eq!(result.shots(), 1000);
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod future;

pub use dispatch::{DispatchState, ExecutionDispatcher};
pub use error::{ExecError, ExecResult, TermFailure};
pub use future::{AsyncObserveResult, AsyncSampleResult, ResultKind};
