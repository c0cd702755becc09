//! Quantum state representation and overlap computation.
//!
//! A [`QuantumState`] is either a pure state vector (2^n amplitudes) or a
//! density matrix (2^n × 2^n), tagged with which it holds. Both come from
//! backend execution or from explicit construction out of a caller-supplied
//! buffer, and both are validated against their invariant on construction:
//! unit norm for vectors, unit trace and Hermiticity for density matrices.
//!
//! # Overlap contract
//!
//! - vector ↔ vector: `|⟨a|b⟩|²`.
//! - density ↔ density: `(‖√ρ₁·√ρ₂‖_tr)²`, with each square root taken via
//!   SVD (`U·√Σ·V†`) and the trace norm computed as the sum of singular
//!   values of the product. The naive `tr(ρ₁ρ₂)` disagrees with this for
//!   unequal mixed states and is NOT what this function computes.
//! - mixed pairing: the vector side is promoted to a rank-1 density matrix
//!   first.

use std::fmt;

use nalgebra::DMatrix;
use num_complex::{Complex32, Complex64};

use crate::error::{CoreError, CoreResult};

/// Tolerance for state norm/trace/Hermiticity validation.
pub const STATE_TOL: f64 = 1e-5;

/// Which representation a state holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// Pure state vector of length 2^n.
    Vector,
    /// Density matrix of shape 2^n × 2^n.
    DensityMatrix,
}

/// A view over an external amplitude buffer, tagged with its element type.
///
/// Only `complex128` buffers are accepted by the constructors; narrower
/// numeric types are rejected rather than silently upcast, so a caller
/// handing over a real-valued or single-precision array finds out
/// immediately.
#[derive(Debug, Clone, Copy)]
pub enum BufferView<'a> {
    /// Double-precision complex, the native amplitude type.
    Complex128(&'a [Complex64]),
    /// Single-precision complex.
    Complex64(&'a [Complex32]),
    /// Double-precision real.
    Float64(&'a [f64]),
    /// Single-precision real.
    Float32(&'a [f32]),
}

impl BufferView<'_> {
    /// The numpy-style dtype name of the viewed elements.
    pub fn dtype_name(&self) -> &'static str {
        match self {
            BufferView::Complex128(_) => "complex128",
            BufferView::Complex64(_) => "complex64",
            BufferView::Float64(_) => "float64",
            BufferView::Float32(_) => "float32",
        }
    }
}

/// A simulation result: state vector or density matrix with an owned buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantumState {
    kind: StateKind,
    num_qubits: u32,
    /// Row dimension: 2^num_qubits.
    dim: usize,
    /// Amplitudes; row-major for density matrices.
    data: Vec<Complex64>,
}

impl QuantumState {
    /// Construct a pure state from its amplitude vector.
    ///
    /// The length must be a power of two ≥ 2 and the squared magnitudes
    /// must sum to 1 within [`STATE_TOL`].
    pub fn from_vector(data: Vec<Complex64>) -> CoreResult<Self> {
        let dim = data.len();
        if dim < 2 || !dim.is_power_of_two() {
            return Err(CoreError::InvalidState {
                reason: format!("state vector length {dim} is not a power of two >= 2"),
            });
        }
        let norm_sq: f64 = data.iter().map(|a| a.norm_sqr()).sum();
        if (norm_sq - 1.0).abs() > STATE_TOL {
            return Err(CoreError::InvalidState {
                reason: format!("state vector norm² = {norm_sq}, expected 1 within {STATE_TOL:e}"),
            });
        }
        Ok(Self {
            kind: StateKind::Vector,
            num_qubits: dim.trailing_zeros(),
            dim,
            data,
        })
    }

    /// Construct a density matrix from row-major data.
    ///
    /// The data must be square with power-of-two dimension, Hermitian, and
    /// have unit trace, all within [`STATE_TOL`].
    pub fn from_density(data: Vec<Complex64>) -> CoreResult<Self> {
        let len = data.len();
        let dim = (len as f64).sqrt().round() as usize;
        if dim * dim != len {
            return Err(CoreError::InvalidState {
                reason: format!("density matrix data has {len} elements, not a square count"),
            });
        }
        if dim < 2 || !dim.is_power_of_two() {
            return Err(CoreError::InvalidState {
                reason: format!("density matrix dimension {dim} is not a power of two >= 2"),
            });
        }

        let mut trace = Complex64::new(0.0, 0.0);
        for i in 0..dim {
            trace += data[i * dim + i];
        }
        if (trace.re - 1.0).abs() > STATE_TOL || trace.im.abs() > STATE_TOL {
            return Err(CoreError::InvalidState {
                reason: format!("density matrix trace = {trace}, expected 1 within {STATE_TOL:e}"),
            });
        }

        for i in 0..dim {
            for j in i..dim {
                let upper = data[i * dim + j];
                let lower = data[j * dim + i];
                if (upper - lower.conj()).norm() > STATE_TOL {
                    return Err(CoreError::InvalidState {
                        reason: format!(
                            "density matrix is not Hermitian at ({i},{j}): {upper} vs conj({lower})"
                        ),
                    });
                }
            }
        }

        Ok(Self {
            kind: StateKind::DensityMatrix,
            num_qubits: dim.trailing_zeros(),
            dim,
            data,
        })
    }

    /// Construct from an external buffer view with the stated representation.
    ///
    /// Only `complex128` buffers are accepted; anything narrower is a
    /// [`CoreError::DtypeMismatch`].
    pub fn from_buffer(view: BufferView<'_>, kind: StateKind) -> CoreResult<Self> {
        let data = match view {
            BufferView::Complex128(data) => data.to_vec(),
            other => {
                return Err(CoreError::DtypeMismatch {
                    expected: "complex128",
                    actual: other.dtype_name(),
                });
            }
        };
        match kind {
            StateKind::Vector => Self::from_vector(data),
            StateKind::DensityMatrix => Self::from_density(data),
        }
    }

    /// Which representation this state holds.
    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Row dimension (2^num_qubits).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The owned amplitude buffer (row-major for density matrices).
    pub fn data(&self) -> &[Complex64] {
        &self.data
    }

    /// Raw pointer to the backing buffer for zero-copy interop.
    ///
    /// The pointer is valid only for the lifetime of this `QuantumState`;
    /// the caller must not hold it past that and must not write through it
    /// while any other access is in flight.
    pub fn device_pointer(&self) -> *const Complex64 {
        self.data.as_ptr()
    }

    /// Amplitude `i` of a state vector.
    pub fn amplitude(&self, index: usize) -> CoreResult<Complex64> {
        if self.kind != StateKind::Vector {
            return Err(CoreError::InvalidState {
                reason: "amplitude indexing requires a state vector, this is a density matrix"
                    .into(),
            });
        }
        self.data
            .get(index)
            .copied()
            .ok_or(CoreError::IndexOutOfRange {
                index,
                len: self.dim,
            })
    }

    /// Element `(i, j)` of a density matrix.
    pub fn matrix_element(&self, row: usize, col: usize) -> CoreResult<Complex64> {
        if self.kind != StateKind::DensityMatrix {
            return Err(CoreError::InvalidState {
                reason: "matrix indexing requires a density matrix, this is a state vector".into(),
            });
        }
        if row >= self.dim {
            return Err(CoreError::IndexOutOfRange {
                index: row,
                len: self.dim,
            });
        }
        if col >= self.dim {
            return Err(CoreError::IndexOutOfRange {
                index: col,
                len: self.dim,
            });
        }
        Ok(self.data[row * self.dim + col])
    }

    /// Overlap (fidelity) with another state, in `[0, 1]`.
    ///
    /// See the module docs for the representation-pairing rules.
    pub fn overlap(&self, other: &QuantumState) -> CoreResult<f64> {
        if self.num_qubits != other.num_qubits {
            return Err(CoreError::InvalidState {
                reason: format!(
                    "overlap between states of {} and {} qubits",
                    self.num_qubits, other.num_qubits
                ),
            });
        }

        match (self.kind, other.kind) {
            (StateKind::Vector, StateKind::Vector) => {
                let dot: Complex64 = self
                    .data
                    .iter()
                    .zip(other.data.iter())
                    .map(|(a, b)| a.conj() * b)
                    .sum();
                Ok(dot.norm_sqr().clamp(0.0, 1.0))
            }
            _ => {
                let rho1 = self.density_dmatrix();
                let rho2 = other.density_dmatrix();
                density_fidelity(&rho1, &rho2)
            }
        }
    }

    /// Overlap against an external buffer of the same representation.
    ///
    /// Dtype-checked like [`QuantumState::from_buffer`].
    pub fn overlap_buffer(&self, view: BufferView<'_>) -> CoreResult<f64> {
        let other = Self::from_buffer(view, self.kind)?;
        self.overlap(&other)
    }

    /// The state as a density matrix (vectors are promoted to |ψ⟩⟨ψ|).
    fn density_dmatrix(&self) -> DMatrix<Complex64> {
        match self.kind {
            StateKind::Vector => DMatrix::from_fn(self.dim, self.dim, |i, j| {
                self.data[i] * self.data[j].conj()
            }),
            StateKind::DensityMatrix => {
                DMatrix::from_row_iterator(self.dim, self.dim, self.data.iter().copied())
            }
        }
    }
}

impl fmt::Display for QuantumState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StateKind::Vector => {
                writeln!(f, "state vector ({} qubits)", self.num_qubits)?;
                for amp in &self.data {
                    writeln!(f, "  ({:.6}, {:.6})", amp.re, amp.im)?;
                }
            }
            StateKind::DensityMatrix => {
                writeln!(f, "density matrix ({} qubits)", self.num_qubits)?;
                for row in 0..self.dim {
                    write!(f, " ")?;
                    for col in 0..self.dim {
                        let e = self.data[row * self.dim + col];
                        write!(f, " ({:.4}, {:.4})", e.re, e.im)?;
                    }
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}

/// Matrix square root via SVD: for `M = U·Σ·V†`, `√M = U·√Σ·V†`.
///
/// Exact for the Hermitian positive-semidefinite matrices that valid
/// density matrices are.
fn matrix_sqrt(m: &DMatrix<Complex64>) -> CoreResult<DMatrix<Complex64>> {
    let svd = m.clone().svd(true, true);
    let u = svd.u.ok_or_else(|| CoreError::InvalidState {
        reason: "SVD did not produce left singular vectors".into(),
    })?;
    let v_t = svd.v_t.ok_or_else(|| CoreError::InvalidState {
        reason: "SVD did not produce right singular vectors".into(),
    })?;
    let sqrt_sigma = DMatrix::from_diagonal(
        &svd.singular_values
            .map(|s| Complex64::new(s.max(0.0).sqrt(), 0.0)),
    );
    Ok(u * sqrt_sigma * v_t)
}

/// Squared trace-norm fidelity: `(‖√ρ₁·√ρ₂‖_tr)²`.
fn density_fidelity(rho1: &DMatrix<Complex64>, rho2: &DMatrix<Complex64>) -> CoreResult<f64> {
    let product = matrix_sqrt(rho1)? * matrix_sqrt(rho2)?;
    let trace_norm: f64 = product.svd(false, false).singular_values.iter().sum();
    Ok((trace_norm * trace_norm).clamp(0.0, 1.0))
}
