//! Error types for the core crate.

use thiserror::Error;

/// Errors that can occur in core runtime operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// Custom operation matrix is malformed or not unitary.
    #[error("Invalid operation '{name}': {reason}")]
    InvalidOperation {
        /// Name of the offending operation.
        name: String,
        /// What the validation found.
        reason: String,
    },

    /// Operation name is not registered.
    #[error("Unknown operation '{0}'")]
    UnknownOperation(String),

    /// Modifier is not supported by the operation.
    #[error("Operation '{op}' does not support the '{modifier}' modifier")]
    UnsupportedModifier {
        /// Name of the operation.
        op: String,
        /// The rejected modifier.
        modifier: String,
    },

    /// State buffer fails the shape or normalization invariant.
    #[error("Invalid state: {reason}")]
    InvalidState {
        /// What the validation found.
        reason: String,
    },

    /// Buffer element type does not match the state's complex dtype.
    #[error("Incompatible buffer dtype: expected {expected}, got {actual}")]
    DtypeMismatch {
        /// The required element type.
        expected: &'static str,
        /// The element type that was supplied.
        actual: &'static str,
    },

    /// State index out of range.
    #[error("Index {index} out of range for dimension {len}")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The dimension of the indexed axis.
        len: usize,
    },

    /// Qubit index outside the kernel's register.
    #[error("Qubit {qubit} out of range for kernel with {num_qubits} qubits")]
    QubitOutOfRange {
        /// The offending qubit index.
        qubit: u32,
        /// Number of qubits in the kernel.
        num_qubits: u32,
    },

    /// A kernel argument slot could not be resolved.
    #[error("Argument {index} {reason}")]
    ArgumentMismatch {
        /// The argument slot index.
        index: usize,
        /// Why resolution failed.
        reason: String,
    },

    /// Aggregating an observe result before every term has a recorded value.
    #[error("Hamiltonian term {term_index} has no recorded expectation")]
    MissingTermExpectation {
        /// Index of the term without a value.
        term_index: usize,
    },
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
