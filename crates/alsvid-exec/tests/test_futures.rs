//! Async futures: serialization round trips, timeouts, partial failure.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use alsvid_adapter_sim::SimulatorBackend;
use alsvid_core::{Hamiltonian, HamiltonianTerm, Kernel, KernelArg, QuantumState};
use alsvid_exec::{AsyncObserveResult, AsyncSampleResult, ExecError, ExecutionDispatcher};
use alsvid_hal::{HalError, HalResult, JobId, JobPoll, QpuBackend};

/// Delegates to the simulator but poisons every n-th submission: the
/// returned job polls as a permanent failure.
struct FaultInjectingBackend {
    inner: SimulatorBackend,
    submissions: AtomicU32,
    fail_on: u32,
}

impl FaultInjectingBackend {
    fn failing_submission(inner: SimulatorBackend, fail_on: u32) -> Self {
        Self {
            inner,
            submissions: AtomicU32::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl QpuBackend for FaultInjectingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn supports_statevector(&self) -> bool {
        false
    }

    fn max_qubits(&self) -> u32 {
        self.inner.max_qubits()
    }

    async fn submit(
        &self,
        kernel: &Kernel,
        args: &[KernelArg],
        shots: u32,
    ) -> HalResult<JobId> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Ok(JobId::new(format!("poisoned-{n}")));
        }
        self.inner.submit(kernel, args, shots).await
    }

    async fn poll(&self, job_id: &JobId) -> HalResult<JobPoll> {
        if job_id.0.starts_with("poisoned-") {
            return Ok(JobPoll::Error("calibration drift on target".into()));
        }
        self.inner.poll(job_id).await
    }

    async fn submit_state(
        &self,
        _kernel: &Kernel,
        _args: &[KernelArg],
    ) -> HalResult<QuantumState> {
        Err(HalError::Unsupported(
            "fault-injecting target cannot return a state".into(),
        ))
    }
}

fn bell_zz_xx_hamiltonian() -> Hamiltonian {
    Hamiltonian::from_terms(vec![
        HamiltonianTerm::zz(0, 1, 1.0),
        HamiltonianTerm::new(
            1.0,
            alsvid_core::PauliString::from_ops([
                (0, alsvid_core::PauliOp::X),
                (1, alsvid_core::PauliOp::X),
            ]),
        ),
        HamiltonianTerm::constant(0.5),
    ])
}

#[tokio::test]
async fn test_sample_future_round_trip() {
    let backend: Arc<dyn QpuBackend> = Arc::new(SimulatorBackend::new());
    let dispatcher = ExecutionDispatcher::new(Arc::clone(&backend));

    let future = dispatcher
        .sample_async(&Kernel::bell().unwrap(), &[], 500)
        .await
        .unwrap();
    let original = future.get(None).await.unwrap();

    let blob = future.serialize().unwrap();
    drop(future);

    // "Process restart": reconstruct from the blob alone.
    let restored = AsyncSampleResult::deserialize(&blob, Arc::clone(&backend)).unwrap();
    let collected = restored.get(None).await.unwrap();

    assert_eq!(original, collected);
    assert_eq!(collected.shots(), 500);
}

#[tokio::test]
async fn test_observe_future_round_trip_matches_sync() {
    let backend: Arc<dyn QpuBackend> = Arc::new(SimulatorBackend::new());
    let dispatcher = ExecutionDispatcher::new(Arc::clone(&backend));
    let kernel = Kernel::bell().unwrap();
    let hamiltonian = bell_zz_xx_hamiltonian();

    let sync_result = dispatcher
        .observe(&kernel, &hamiltonian, &[], 800)
        .await
        .unwrap();

    let future = dispatcher
        .observe_async(&kernel, &hamiltonian, &[], 800)
        .await
        .unwrap();
    let blob = future.serialize().unwrap();
    drop(future);

    let restored =
        AsyncObserveResult::deserialize(&blob, Arc::clone(&backend), hamiltonian.clone())
            .unwrap();
    let collected = restored.get(None).await.unwrap();

    // The Bell expectations are shot-noise free, so the values agree
    // exactly with the synchronous run.
    assert_eq!(
        sync_result.expectation().unwrap(),
        collected.expectation().unwrap()
    );
    assert!((collected.expectation().unwrap() - 2.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_polling_is_idempotent() {
    let backend: Arc<dyn QpuBackend> = Arc::new(SimulatorBackend::new());
    let dispatcher = ExecutionDispatcher::new(Arc::clone(&backend));

    let future = dispatcher
        .sample_async(&Kernel::bell().unwrap(), &[], 200)
        .await
        .unwrap();

    let first = future.get(None).await.unwrap();
    let second = future.get(None).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_timeout_leaves_future_valid() {
    let backend: Arc<dyn QpuBackend> =
        Arc::new(SimulatorBackend::new().with_pending_polls(3));
    let dispatcher = ExecutionDispatcher::new(Arc::clone(&backend));

    let future = dispatcher
        .sample_async(&Kernel::bell().unwrap(), &[], 100)
        .await
        .unwrap();

    let err = future.get(Some(Duration::from_millis(20))).await.unwrap_err();
    assert!(matches!(err, ExecError::Timeout { .. }));

    // The job was not consumed; an unbounded get still succeeds.
    let result = future.get(None).await.unwrap();
    assert_eq!(result.shots(), 100);
}

#[tokio::test]
async fn test_sample_blob_rejected_as_observe() {
    let backend: Arc<dyn QpuBackend> = Arc::new(SimulatorBackend::new());
    let dispatcher = ExecutionDispatcher::new(Arc::clone(&backend));

    let future = dispatcher
        .sample_async(&Kernel::bell().unwrap(), &[], 10)
        .await
        .unwrap();
    let blob = future.serialize().unwrap();

    let err = AsyncObserveResult::deserialize(
        &blob,
        Arc::clone(&backend),
        bell_zz_xx_hamiltonian(),
    )
    .unwrap_err();
    assert!(matches!(err, ExecError::FutureFormat(_)));
}

#[tokio::test]
async fn test_observe_blob_requires_matching_hamiltonian() {
    let backend: Arc<dyn QpuBackend> = Arc::new(SimulatorBackend::new());
    let dispatcher = ExecutionDispatcher::new(Arc::clone(&backend));

    let future = dispatcher
        .observe_async(&Kernel::bell().unwrap(), &bell_zz_xx_hamiltonian(), &[], 10)
        .await
        .unwrap();
    let blob = future.serialize().unwrap();

    // A Hamiltonian with a different non-identity term count cannot
    // reconstruct the term → job mapping.
    let wrong = Hamiltonian::from_terms(vec![HamiltonianTerm::z(0, 1.0)]);
    let err = AsyncObserveResult::deserialize(&blob, Arc::clone(&backend), wrong).unwrap_err();
    assert!(matches!(err, ExecError::FutureFormat(_)));
}

#[tokio::test]
async fn test_backend_mismatch_rejected() {
    let sim: Arc<dyn QpuBackend> = Arc::new(SimulatorBackend::new());
    let dispatcher = ExecutionDispatcher::new(Arc::clone(&sim));
    let future = dispatcher
        .sample_async(&Kernel::bell().unwrap(), &[], 10)
        .await
        .unwrap();
    let blob = future.serialize().unwrap();

    // Hand-edit the blob to claim a different backend.
    let tampered = blob.replace("simulator", "other-qpu");
    let err = AsyncSampleResult::deserialize(&tampered, Arc::clone(&sim)).unwrap_err();
    assert!(matches!(err, ExecError::FutureFormat(_)));
}

#[tokio::test]
async fn test_one_failing_term_preserves_the_others() {
    // Second submission (the XX term) is poisoned; ZZ completes.
    let backend: Arc<dyn QpuBackend> = Arc::new(FaultInjectingBackend::failing_submission(
        SimulatorBackend::new(),
        2,
    ));
    let dispatcher = ExecutionDispatcher::new(Arc::clone(&backend));

    let err = dispatcher
        .observe(&Kernel::bell().unwrap(), &bell_zz_xx_hamiltonian(), &[], 400)
        .await
        .unwrap_err();

    let ExecError::TermsFailed { failures, partial } = err else {
        panic!("expected TermsFailed, got {err:?}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].term_index, 1);
    assert!(failures[0].diagnostic.contains("calibration drift"));

    // Completed terms remain queryable on the partial result...
    assert!((partial.term_expectation(0).unwrap() - 1.0).abs() < 1e-9);
    assert!((partial.term_expectation(2).unwrap() - 1.0).abs() < 1e-9);
    // ...but aggregation refuses to produce a silent partial sum.
    assert!(partial.expectation().is_err());
}

#[tokio::test]
async fn test_get_state_unsupported_on_non_statevector_target() {
    let backend: Arc<dyn QpuBackend> = Arc::new(FaultInjectingBackend::failing_submission(
        SimulatorBackend::new(),
        u32::MAX,
    ));
    let dispatcher = ExecutionDispatcher::new(backend);

    let mut kernel = Kernel::new("prep", 1);
    kernel.h(alsvid_core::QubitId(0)).unwrap();
    let err = dispatcher.get_state(&kernel, &[]).await.unwrap_err();
    assert!(matches!(err, ExecError::Hal(HalError::Unsupported(_))));
}
