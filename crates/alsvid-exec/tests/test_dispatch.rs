//! End-to-end dispatch tests against the simulator backend.

use std::sync::Arc;

use num_complex::Complex64;

use alsvid_adapter_sim::SimulatorBackend;
use alsvid_core::{
    CoreError, Hamiltonian, HamiltonianTerm, Kernel, OperationDef, QubitId, QuantumState,
    UnitaryMatrix, UnitaryRegistry,
};
use alsvid_exec::{ExecError, ExecutionDispatcher};
use alsvid_hal::HalError;

fn dispatcher() -> ExecutionDispatcher {
    ExecutionDispatcher::new(Arc::new(SimulatorBackend::new()))
}

fn c(re: f64) -> Complex64 {
    Complex64::new(re, 0.0)
}

#[tokio::test]
async fn test_sample_bell_sync() {
    let result = dispatcher()
        .sample(&Kernel::bell().unwrap(), &[], 1000)
        .await
        .unwrap();

    assert_eq!(result.shots(), 1000);
    assert_eq!(result.counts().total(), 1000);
    let counts = result.counts();
    assert_eq!(counts.get("00") + counts.get("11"), 1000);
    assert_eq!(counts.get("01") + counts.get("10"), 0);
}

#[tokio::test]
async fn test_custom_h2_ctrl_x_scenario() {
    // Register the four-decimal Hadamard as H2, build the Bell circuit out
    // of it and a controlled custom X, and sample.
    let registry = UnitaryRegistry::new();
    registry
        .register_matrix(
            2,
            vec![c(0.7071), c(0.7071), c(0.7071), c(-0.7071)],
            Some("H2"),
        )
        .unwrap();
    registry
        .register_matrix(2, vec![c(0.0), c(1.0), c(1.0), c(0.0)], Some("my_x"))
        .unwrap();

    let mut kernel = Kernel::new("h2_bell", 2);
    kernel
        .custom(&registry, "H2", &[QubitId(0)], vec![])
        .unwrap()
        .custom_ctrl(&registry, "my_x", &[QubitId(0)], &[QubitId(1)], vec![])
        .unwrap()
        .measure_all()
        .unwrap();

    let result = dispatcher().sample(&kernel, &[], 1000).await.unwrap();
    let counts = result.counts();
    assert_eq!(counts.get("00") + counts.get("11"), 1000);
    assert_eq!(counts.len(), 2, "only 00 and 11 may appear: {counts:?}");
}

#[tokio::test]
async fn test_observe_bell_sync() {
    // ⟨Z₀Z₁⟩ = ⟨X₀X₁⟩ = 1 on a Bell pair, both exactly: every shot has
    // even parity in the relevant basis. The identity term adds 0.5.
    let hamiltonian = Hamiltonian::from_terms(vec![
        HamiltonianTerm::zz(0, 1, 1.0),
        HamiltonianTerm::new(
            1.0,
            alsvid_core::PauliString::from_ops([
                (0, alsvid_core::PauliOp::X),
                (1, alsvid_core::PauliOp::X),
            ]),
        ),
        HamiltonianTerm::constant(0.5),
    ]);

    let result = dispatcher()
        .observe(&Kernel::bell().unwrap(), &hamiltonian, &[], 1000)
        .await
        .unwrap();

    assert!(result.is_complete());
    let expectation = result.expectation().unwrap();
    assert!((expectation - 2.5).abs() < 1e-9, "got {expectation}");

    // Every non-identity term got its own job.
    let with_jobs = result.terms().iter().filter(|t| t.job_id.is_some()).count();
    assert_eq!(with_jobs, 2);
}

#[tokio::test]
async fn test_observe_validates_qubit_budget_locally() {
    // The Hamiltonian references qubit 5; the kernel has 2 qubits. This
    // must fail before any job is submitted.
    let hamiltonian = Hamiltonian::from_terms(vec![HamiltonianTerm::z(5, 1.0)]);
    let err = dispatcher()
        .observe(&Kernel::bell().unwrap(), &hamiltonian, &[], 100)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecError::Core(CoreError::QubitOutOfRange { qubit: 5, num_qubits: 2 })
    ));
}

#[tokio::test]
async fn test_get_state_bell() {
    let mut kernel = Kernel::new("bell_prep", 2);
    kernel
        .h(QubitId(0))
        .unwrap()
        .cx(QubitId(0), QubitId(1))
        .unwrap();

    let state = dispatcher().get_state(&kernel, &[]).await.unwrap();
    assert_eq!(state.num_qubits(), 2);
    assert!((state.overlap(&state).unwrap() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_state_overlap_against_promoted_density() {
    // Executing the Bell preparation and comparing against the Bell
    // density matrix exercises the vector → density promotion.
    let mut kernel = Kernel::new("bell_prep", 2);
    kernel
        .h(QubitId(0))
        .unwrap()
        .cx(QubitId(0), QubitId(1))
        .unwrap();
    let state = dispatcher().get_state(&kernel, &[]).await.unwrap();

    let density = QuantumState::from_density(vec![
        c(0.5), c(0.0), c(0.0), c(0.5),
        c(0.0), c(0.0), c(0.0), c(0.0),
        c(0.0), c(0.0), c(0.0), c(0.0),
        c(0.5), c(0.0), c(0.0), c(0.5),
    ])
    .unwrap();

    let fidelity = state.overlap(&density).unwrap();
    assert!((fidelity - 1.0).abs() < 1e-6, "got {fidelity}");
}

#[tokio::test]
async fn test_retry_recovers_transient_submission_failures() {
    let backend = Arc::new(SimulatorBackend::new().with_transient_failures(2));
    let dispatcher = ExecutionDispatcher::new(backend);

    // Default policy allows 3 attempts; two transient failures are absorbed.
    let result = dispatcher
        .sample(&Kernel::bell().unwrap(), &[], 100)
        .await
        .unwrap();
    assert_eq!(result.shots(), 100);
}

#[tokio::test]
async fn test_zero_shots_surfaces_before_results() {
    let err = dispatcher()
        .sample(&Kernel::bell().unwrap(), &[], 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ExecError::Hal(HalError::InvalidShots(_))));
}

#[tokio::test]
async fn test_generator_failure_becomes_job_failure() {
    // A parametric operation that is only unitary at |t| = 1, invoked at
    // t = 3: registration succeeds, the job fails with the op's name in
    // the diagnostic.
    let registry = UnitaryRegistry::new();
    let generator: alsvid_core::GeneratorFn = Box::new(|params: &[f64]| {
        let t = params.first().copied().unwrap_or(0.0);
        UnitaryMatrix::new(
            2,
            vec![c(t), c(0.0), c(0.0), c(t)],
        )
    });
    registry
        .register(OperationDef::Generator(generator), Some("scaled_id"))
        .unwrap();

    let mut kernel = Kernel::new("bad", 1);
    kernel
        .custom(
            &registry,
            "scaled_id",
            &[QubitId(0)],
            vec![alsvid_core::Param::Value(3.0)],
        )
        .unwrap();
    kernel.measure_all().unwrap();

    let err = dispatcher().sample(&kernel, &[], 10).await.unwrap_err();
    let ExecError::JobFailed { diagnostic, .. } = err else {
        panic!("expected JobFailed, got {err:?}");
    };
    assert!(diagnostic.contains("scaled_id"));
}
