//! Simulator backend implementation.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, instrument};
use uuid::Uuid;

use alsvid_core::{Counts, CoreError, Kernel, KernelArg, QuantumState};
use alsvid_hal::{
    BackendConfig, HalError, HalResult, Job, JobId, JobPoll, JobStatus, QpuBackend,
};

use crate::statevector::Statevector;

/// Job data for the simulator.
struct SimJob {
    job: Job,
    counts: Option<Counts>,
    /// Remaining polls to answer `Pending` before going terminal.
    polls_remaining: u32,
}

/// Local statevector simulator backend.
///
/// Executes kernels eagerly at submit time and serves the outcome through
/// the usual poll interface, so callers exercise the same job lifecycle a
/// remote target would give them. Supports kernels up to ~20 qubits
/// (limited by memory).
pub struct SimulatorBackend {
    /// Backend configuration.
    config: BackendConfig,
    /// Finished jobs by id.
    jobs: Arc<Mutex<FxHashMap<String, SimJob>>>,
    /// Maximum number of qubits supported.
    max_qubits: u32,
    /// Polls to answer `Pending` before revealing a job's outcome.
    pending_polls: u32,
    /// Remaining submissions to fail with a transient error.
    transient_failures: AtomicU32,
}

impl SimulatorBackend {
    /// Create a new simulator backend with default settings.
    pub fn new() -> Self {
        Self {
            config: BackendConfig::new("simulator"),
            jobs: Arc::new(Mutex::new(FxHashMap::default())),
            max_qubits: 20,
            pending_polls: 0,
            transient_failures: AtomicU32::new(0),
        }
    }

    /// Create a simulator with custom max qubits.
    pub fn with_max_qubits(max_qubits: u32) -> Self {
        Self {
            max_qubits,
            ..Self::new()
        }
    }

    /// Answer `Pending` for the first `n` polls of every job.
    ///
    /// Lets tests exercise the enqueue/poll path a remote queue exhibits.
    pub fn with_pending_polls(mut self, n: u32) -> Self {
        self.pending_polls = n;
        self
    }

    /// Fail the next `n` submissions with a transient error.
    ///
    /// Lets tests exercise the retry policy.
    pub fn with_transient_failures(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    fn check_kernel(&self, kernel: &Kernel) -> HalResult<()> {
        if kernel.num_qubits() > self.max_qubits {
            return Err(HalError::KernelTooLarge(format!(
                "kernel '{}' has {} qubits but the simulator supports {}",
                kernel.name(),
                kernel.num_qubits(),
                self.max_qubits
            )));
        }
        Ok(())
    }

    /// Run the sampling simulation synchronously.
    #[instrument(skip(self, kernel, args))]
    fn run_simulation(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
        shots: u32,
    ) -> Result<Counts, CoreError> {
        let start = Instant::now();
        let num_qubits = kernel.num_qubits() as usize;
        debug!(kernel = kernel.name(), num_qubits, shots, "starting simulation");

        let mut prepared = Statevector::new(num_qubits);
        prepared.run(kernel, args)?;

        let mut counts = Counts::new();
        for _ in 0..shots {
            let outcome = prepared.sample();
            counts.insert(prepared.outcome_to_bitstring(outcome), 1);
        }

        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "simulation completed");
        Ok(counts)
    }
}

impl Default for SimulatorBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QpuBackend for SimulatorBackend {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn supports_statevector(&self) -> bool {
        true
    }

    fn max_qubits(&self) -> u32 {
        self.max_qubits
    }

    #[instrument(skip(self, kernel, args))]
    async fn submit(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
        shots: u32,
    ) -> HalResult<JobId> {
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(HalError::Transient("simulated submission hiccup".into()));
        }

        if shots == 0 {
            return Err(HalError::InvalidShots("shots must be at least 1".into()));
        }
        self.check_kernel(kernel)?;

        let job_id = JobId::new(Uuid::new_v4().to_string());

        // Execution-time failures (e.g. a generator producing a bad matrix)
        // surface through the job, the way a remote target reports them.
        let (status, counts) = match self.run_simulation(kernel, args, shots) {
            Ok(counts) => (JobStatus::Completed, Some(counts)),
            Err(e) => (JobStatus::Failed(e.to_string()), None),
        };
        let job = Job::new(job_id.clone(), shots)
            .with_backend(self.name())
            .with_status(status);

        let sim_job = SimJob {
            job,
            counts,
            polls_remaining: self.pending_polls,
        };

        {
            let mut jobs = self
                .jobs
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            jobs.insert(job_id.0.clone(), sim_job);
        }

        debug!(%job_id, "submitted job");
        Ok(job_id)
    }

    async fn poll(&self, job_id: &JobId) -> HalResult<JobPoll> {
        let mut jobs = self
            .jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let sim_job = jobs
            .get_mut(&job_id.0)
            .ok_or_else(|| HalError::JobNotFound(job_id.0.clone()))?;

        if sim_job.polls_remaining > 0 {
            sim_job.polls_remaining -= 1;
            return Ok(JobPoll::Pending);
        }

        match &sim_job.job.status {
            JobStatus::Failed(diagnostic) => Ok(JobPoll::Error(diagnostic.clone())),
            JobStatus::Completed => match &sim_job.counts {
                Some(counts) => Ok(JobPoll::Counts(counts.clone())),
                None => Err(HalError::JobFailed(format!(
                    "completed job {job_id} has no stored counts"
                ))),
            },
            JobStatus::Queued | JobStatus::Running => Ok(JobPoll::Pending),
        }
    }

    #[instrument(skip(self, kernel, args))]
    async fn submit_state(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
    ) -> HalResult<QuantumState> {
        self.check_kernel(kernel)?;

        let mut sv = Statevector::new(kernel.num_qubits() as usize);
        sv.run(kernel, args)?;
        Ok(QuantumState::from_vector(sv.into_amplitudes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvid_core::QubitId;

    #[tokio::test]
    async fn test_simulator_capabilities() {
        let backend = SimulatorBackend::new();
        assert!(backend.supports_statevector());
        assert_eq!(backend.max_qubits(), 20);
        assert_eq!(backend.name(), "simulator");
    }

    #[tokio::test]
    async fn test_simulator_bell_sampling() {
        let backend = SimulatorBackend::new();
        let kernel = Kernel::bell().unwrap();

        let job_id = backend.submit(&kernel, &[], 1000).await.unwrap();
        let poll = backend.poll(&job_id).await.unwrap();

        let JobPoll::Counts(counts) = poll else {
            panic!("expected counts, got {poll:?}");
        };
        assert_eq!(counts.get("00") + counts.get("11"), 1000);
        assert_eq!(counts.get("01") + counts.get("10"), 0);
    }

    #[tokio::test]
    async fn test_simulator_ghz_sampling() {
        let backend = SimulatorBackend::new();
        let kernel = Kernel::ghz(3).unwrap();

        let job_id = backend.submit(&kernel, &[], 500).await.unwrap();
        let JobPoll::Counts(counts) = backend.poll(&job_id).await.unwrap() else {
            panic!("expected counts");
        };
        assert_eq!(counts.get("000") + counts.get("111"), 500);
    }

    #[tokio::test]
    async fn test_zero_shots_rejected() {
        let backend = SimulatorBackend::new();
        let kernel = Kernel::bell().unwrap();
        let err = backend.submit(&kernel, &[], 0).await.unwrap_err();
        assert!(matches!(err, HalError::InvalidShots(_)));
    }

    #[tokio::test]
    async fn test_too_many_qubits() {
        let backend = SimulatorBackend::with_max_qubits(5);
        let kernel = Kernel::new("wide", 10);
        let err = backend.submit(&kernel, &[], 100).await.unwrap_err();
        assert!(matches!(err, HalError::KernelTooLarge(_)));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let backend = SimulatorBackend::new();
        let err = backend.poll(&JobId::new("missing")).await.unwrap_err();
        assert!(matches!(err, HalError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_pending_polls_then_counts() {
        let backend = SimulatorBackend::new().with_pending_polls(2);
        let kernel = Kernel::bell().unwrap();
        let job_id = backend.submit(&kernel, &[], 10).await.unwrap();

        assert!(matches!(backend.poll(&job_id).await.unwrap(), JobPoll::Pending));
        assert!(matches!(backend.poll(&job_id).await.unwrap(), JobPoll::Pending));
        assert!(matches!(
            backend.poll(&job_id).await.unwrap(),
            JobPoll::Counts(_)
        ));
        // Terminal answers are permanent.
        assert!(matches!(
            backend.poll(&job_id).await.unwrap(),
            JobPoll::Counts(_)
        ));
    }

    #[tokio::test]
    async fn test_transient_failures_consumed() {
        let backend = SimulatorBackend::new().with_transient_failures(1);
        let kernel = Kernel::bell().unwrap();

        let err = backend.submit(&kernel, &[], 10).await.unwrap_err();
        assert!(err.is_transient());
        assert!(backend.submit(&kernel, &[], 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_submit_state_bell() {
        let backend = SimulatorBackend::new();
        let mut kernel = Kernel::new("bell_state", 2);
        kernel.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();

        let state = backend.submit_state(&kernel, &[]).await.unwrap();
        assert_eq!(state.num_qubits(), 2);
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!((state.amplitude(0).unwrap().re - sqrt2_inv).abs() < 1e-9);
        assert!((state.amplitude(3).unwrap().re - sqrt2_inv).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_generator_failure_surfaces_through_job() {
        use alsvid_core::{GeneratorFn, OperationDef, UnitaryMatrix, UnitaryRegistry};
        use num_complex::Complex64;

        let registry = UnitaryRegistry::new();
        let generator: GeneratorFn = Box::new(|params: &[f64]| {
            let t = params.first().copied().unwrap_or(0.0);
            UnitaryMatrix::new(
                2,
                vec![
                    Complex64::new(t, 0.0),
                    Complex64::new(0.0, 0.0),
                    Complex64::new(0.0, 0.0),
                    Complex64::new(t, 0.0),
                ],
            )
        });
        registry
            .register(OperationDef::Generator(generator), Some("scaled"))
            .unwrap();

        let mut kernel = Kernel::new("bad", 1);
        kernel
            .custom(
                &registry,
                "scaled",
                &[QubitId(0)],
                vec![alsvid_core::Param::Value(3.0)],
            )
            .unwrap();

        let backend = SimulatorBackend::new();
        let job_id = backend.submit(&kernel, &[], 10).await.unwrap();
        let poll = backend.poll(&job_id).await.unwrap();
        let JobPoll::Error(diag) = poll else {
            panic!("expected error poll, got {poll:?}");
        };
        assert!(diag.contains("scaled"));
    }
}
