//! Kernel execution dispatch.
//!
//! The [`ExecutionDispatcher`] orchestrates kernel execution against a
//! configured backend. Every request moves through the same state machine:
//!
//! ```text
//!   Pending ──→ Dispatched ──→ Completed
//!                   │
//!                   └────────→ Failed
//! ```
//!
//! The synchronous entry points (`sample`, `observe`, `get_state`) await
//! completion before returning; the `_async` variants return immediately
//! after enqueue with a pollable, serializable handle.
//!
//! For `observe`, the Hamiltonian is decomposed into independently
//! measurable terms and every non-identity term is dispatched as its own
//! job. One term's failure does not invalidate the others: completed
//! terms stay recorded and are carried inside the error.

use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use alsvid_core::{
    CoreError, Hamiltonian, Kernel, KernelArg, ObserveResult, PauliOp, PauliString, QuantumState,
    QubitId, SampleResult,
};
use alsvid_hal::{QpuBackend, RetryPolicy};

use crate::error::ExecResult;
use crate::future::{AsyncObserveResult, AsyncSampleResult};

/// Lifecycle phase of an execution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Validated locally, not yet handed to the backend.
    Pending,
    /// Enqueued on the backend, awaiting completion.
    Dispatched,
    /// All constituent jobs completed.
    Completed,
    /// At least one constituent job permanently failed.
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::Pending => write!(f, "Pending"),
            DispatchState::Dispatched => write!(f, "Dispatched"),
            DispatchState::Completed => write!(f, "Completed"),
            DispatchState::Failed => write!(f, "Failed"),
        }
    }
}

/// Orchestrates synchronous and asynchronous kernel execution.
pub struct ExecutionDispatcher {
    backend: Arc<dyn QpuBackend>,
    retry: RetryPolicy,
}

impl ExecutionDispatcher {
    /// Create a dispatcher over a configured backend with the default
    /// retry policy.
    pub fn new(backend: Arc<dyn QpuBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy for transient backend failures.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The backend this dispatcher submits to.
    pub fn backend(&self) -> &Arc<dyn QpuBackend> {
        &self.backend
    }

    /// Sample a kernel, blocking until counts are available.
    pub async fn sample(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
        shots: u32,
    ) -> ExecResult<SampleResult> {
        self.sample_async(kernel, args, shots).await?.get(None).await
    }

    /// Enqueue a sampling job and return a handle immediately.
    pub async fn sample_async(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
        shots: u32,
    ) -> ExecResult<AsyncSampleResult> {
        debug!(kernel = kernel.name(), shots, state = %DispatchState::Pending, "sample request");
        let job_id = self
            .retry
            .run(|| self.backend.submit(kernel, args, shots))
            .await?;
        debug!(kernel = kernel.name(), %job_id, state = %DispatchState::Dispatched, "sample enqueued");
        Ok(AsyncSampleResult::new(
            Arc::clone(&self.backend),
            self.retry.clone(),
            job_id,
        ))
    }

    /// Observe a Hamiltonian on a kernel, blocking until every term's
    /// expectation is recorded.
    pub async fn observe(
        &self,
        kernel: &Kernel,
        hamiltonian: &Hamiltonian,
        args: &[KernelArg],
        shots: u32,
    ) -> ExecResult<ObserveResult> {
        self.observe_async(kernel, hamiltonian, args, shots)
            .await?
            .get(None)
            .await
    }

    /// Enqueue one job per non-identity Hamiltonian term and return a
    /// handle immediately.
    ///
    /// Identity terms contribute their coefficient directly (expectation
    /// 1) and get no job. Job ids are ordered by term index; aggregation
    /// keys each result by its job id, so completion order is free.
    pub async fn observe_async(
        &self,
        kernel: &Kernel,
        hamiltonian: &Hamiltonian,
        args: &[KernelArg],
        shots: u32,
    ) -> ExecResult<AsyncObserveResult> {
        // Local validation before any backend traffic.
        if hamiltonian.min_qubits() > kernel.num_qubits() {
            return Err(CoreError::QubitOutOfRange {
                qubit: hamiltonian.min_qubits() - 1,
                num_qubits: kernel.num_qubits(),
            }
            .into());
        }

        debug!(
            kernel = kernel.name(),
            terms = hamiltonian.n_terms(),
            state = %DispatchState::Pending,
            "observe request"
        );

        let mut job_ids = Vec::new();
        for (index, term) in hamiltonian.terms().iter().enumerate() {
            if term.pauli.is_identity() {
                continue;
            }
            let term_kernel = measurement_kernel(kernel, &term.pauli)?;
            let job_id = self
                .retry
                .run(|| self.backend.submit(&term_kernel, args, shots))
                .await?;
            debug!(term = index, %job_id, "term job enqueued");
            job_ids.push(job_id);
        }

        debug!(
            kernel = kernel.name(),
            jobs = job_ids.len(),
            state = %DispatchState::Dispatched,
            "observe enqueued"
        );
        Ok(AsyncObserveResult::new(
            Arc::clone(&self.backend),
            self.retry.clone(),
            job_ids,
            hamiltonian.clone(),
        ))
    }

    /// Execute a kernel and return the simulated quantum state.
    ///
    /// Only available on statevector targets.
    pub async fn get_state(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
    ) -> ExecResult<QuantumState> {
        if !self.backend.supports_statevector() {
            return Err(alsvid_hal::HalError::Unsupported(format!(
                "backend '{}' cannot return a quantum state",
                self.backend.name()
            ))
            .into());
        }
        let state = self
            .retry
            .run(|| self.backend.submit_state(kernel, args))
            .await?;
        Ok(state)
    }
}

/// Derive the kernel that measures one Pauli term.
///
/// Rotates each X factor with `Ry(-π/2)` and each Y factor with `Rx(π/2)`
/// so the term becomes diagonal in the computational basis, then measures
/// everything. The base kernel's own terminal measurements are stripped
/// first so the rotations land between preparation and measurement.
fn measurement_kernel(base: &Kernel, pauli: &PauliString) -> ExecResult<Kernel> {
    let mut kernel = base.without_measurements();
    for (qubit, op) in pauli.ops() {
        match op {
            PauliOp::X => {
                kernel.ry(QubitId(*qubit), -FRAC_PI_2)?;
            }
            PauliOp::Y => {
                kernel.rx(QubitId(*qubit), FRAC_PI_2)?;
            }
            PauliOp::Z => {}
            // PauliString drops identity factors at construction.
            PauliOp::I => {}
        }
    }
    kernel.measure_all()?;
    Ok(kernel)
}
