//! Core types for the Alsvid kernel-execution runtime.
//!
//! This crate holds everything the execution layer and backend adapters
//! share:
//!
//! - [`Kernel`] — a minimal parameterized program representation with a
//!   chainable, validating builder.
//! - [`UnitaryRegistry`] — dynamically registered custom operations, fixed
//!   or parametric, with closed-set modifier support.
//! - [`QuantumState`] — state vector / density matrix results with a
//!   single overlap contract across both representations.
//! - [`SampleResult`] / [`ObserveResult`] — measurement-count and
//!   expectation-value containers.
//! - [`Hamiltonian`] — sum-of-Pauli-strings observables whose terms are
//!   independently measurable.
//!
//! # Example
//!
//! ```rust
//! use alsvid_core::{Kernel, OperationDef, QubitId, UnitaryMatrix, UnitaryRegistry};
//!
//! let registry = UnitaryRegistry::new();
//! let s = std::f64::consts::FRAC_1_SQRT_2;
//! let h = UnitaryMatrix::from_real(2, &[s, s, s, -s]).unwrap();
//! registry.register(OperationDef::Fixed(h), Some("my_h")).unwrap();
//!
//! let mut kernel = Kernel::new("bell", 2);
//! kernel
//!     .custom(&registry, "my_h", &[QubitId(0)], vec![]).unwrap()
//!     .cx(QubitId(0), QubitId(1)).unwrap()
//!     .measure_all().unwrap();
//! assert_eq!(kernel.instructions().len(), 4);
//! ```

pub mod error;
pub mod hamiltonian;
pub mod kernel;
pub mod registry;
pub mod result;
pub mod state;
pub mod unitary;

pub use error::{CoreError, CoreResult};
pub use hamiltonian::{Hamiltonian, HamiltonianTerm, PauliOp, PauliString};
pub use kernel::{
    CustomOp, Instruction, InstructionKind, Kernel, KernelArg, Param, QubitId, StandardGate,
};
pub use registry::{
    GeneratorFn, Modifier, OperationDef, OperationHandle, UnitaryEntry, UnitaryRegistry,
};
pub use result::{Counts, ObserveResult, SampleResult, TermExpectation};
pub use state::{BufferView, QuantumState, STATE_TOL, StateKind};
pub use unitary::{UNITARY_TOL, UnitaryMatrix};
