//! Dense unitary matrices for custom operations.
//!
//! A [`UnitaryMatrix`] is a square, power-of-two-dimensioned complex matrix
//! stored row-major. Operand ordering follows the textbook convention: for a
//! matrix acting on qubits `(q0, q1, …)`, `q0` is the most significant bit of
//! the row/column index, so the usual CNOT matrix has `q0` as the control.

use num_complex::Complex64;

use crate::error::{CoreError, CoreResult};

/// Tolerance for the `U·U† ≈ I` unitarity check.
///
/// Loose enough to accept matrices specified to four decimal places
/// (a Hadamard written with 0.7071 entries deviates by ~2e-5).
pub const UNITARY_TOL: f64 = 1e-4;

/// A square complex matrix of dimension `2^k`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitaryMatrix {
    dim: usize,
    data: Vec<Complex64>,
}

impl UnitaryMatrix {
    /// Create a matrix from row-major data, validating the shape invariant.
    ///
    /// Fails if `data.len() != dim * dim` or `dim` is not a power of two
    /// greater than one. Unitarity is checked separately by
    /// [`UnitaryMatrix::is_unitary`] so callers can report the operation
    /// name in the error.
    pub fn new(dim: usize, data: Vec<Complex64>) -> CoreResult<Self> {
        if data.len() != dim * dim {
            return Err(CoreError::InvalidState {
                reason: format!(
                    "matrix data has {} elements, expected {}x{} = {}",
                    data.len(),
                    dim,
                    dim,
                    dim * dim
                ),
            });
        }
        if dim < 2 || !dim.is_power_of_two() {
            return Err(CoreError::InvalidState {
                reason: format!("matrix dimension {dim} is not a power of two >= 2"),
            });
        }
        Ok(Self { dim, data })
    }

    /// Build from real entries (convenience for gate tables and tests).
    pub fn from_real(dim: usize, entries: &[f64]) -> CoreResult<Self> {
        let data = entries.iter().map(|x| Complex64::new(*x, 0.0)).collect();
        Self::new(dim, data)
    }

    /// The identity matrix of the given dimension.
    pub fn identity(dim: usize) -> CoreResult<Self> {
        let mut data = vec![Complex64::new(0.0, 0.0); dim * dim];
        for i in 0..dim {
            data[i * dim + i] = Complex64::new(1.0, 0.0);
        }
        Self::new(dim, data)
    }

    /// Matrix dimension (rows == columns).
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of target qubits this matrix acts on (log2 of the dimension).
    pub fn num_targets(&self) -> u32 {
        self.dim.trailing_zeros()
    }

    /// Row-major element access.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.data[row * self.dim + col]
    }

    /// The raw row-major data.
    pub fn data(&self) -> &[Complex64] {
        &self.data
    }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Self {
        let mut data = vec![Complex64::new(0.0, 0.0); self.dim * self.dim];
        for r in 0..self.dim {
            for c in 0..self.dim {
                data[c * self.dim + r] = self.get(r, c).conj();
            }
        }
        Self {
            dim: self.dim,
            data,
        }
    }

    /// Controlled expansion with `num_controls` control qubits.
    ///
    /// The controls occupy the most significant index bits: the result is
    /// identity everywhere except the bottom-right `dim × dim` block (the
    /// projector onto |1…1⟩ of the controls), which holds `self`.
    pub fn controlled(&self, num_controls: u32) -> Self {
        let new_dim = self.dim << num_controls;
        let mut data = vec![Complex64::new(0.0, 0.0); new_dim * new_dim];
        let offset = new_dim - self.dim;
        for i in 0..offset {
            data[i * new_dim + i] = Complex64::new(1.0, 0.0);
        }
        for r in 0..self.dim {
            for c in 0..self.dim {
                data[(offset + r) * new_dim + (offset + c)] = self.get(r, c);
            }
        }
        Self { dim: new_dim, data }
    }

    /// Check `U·U† ≈ I` within the given tolerance.
    pub fn is_unitary(&self, tol: f64) -> bool {
        for r in 0..self.dim {
            for c in 0..self.dim {
                let mut acc = Complex64::new(0.0, 0.0);
                for k in 0..self.dim {
                    acc += self.get(r, k) * self.get(c, k).conj();
                }
                let expect = if r == c { 1.0 } else { 0.0 };
                if (acc - Complex64::new(expect, 0.0)).norm() > tol {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

    fn hadamard() -> UnitaryMatrix {
        UnitaryMatrix::from_real(
            2,
            &[
                FRAC_1_SQRT_2,
                FRAC_1_SQRT_2,
                FRAC_1_SQRT_2,
                -FRAC_1_SQRT_2,
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_validation() {
        assert!(UnitaryMatrix::from_real(3, &[0.0; 9]).is_err());
        assert!(UnitaryMatrix::from_real(2, &[0.0; 3]).is_err());
        assert!(UnitaryMatrix::from_real(1, &[1.0]).is_err());
    }

    #[test]
    fn test_hadamard_unitary() {
        assert!(hadamard().is_unitary(UNITARY_TOL));
        assert_eq!(hadamard().num_targets(), 1);
    }

    #[test]
    fn test_non_unitary_detected() {
        let m = UnitaryMatrix::from_real(2, &[1.0, 0.0, 0.0, 2.0]).unwrap();
        assert!(!m.is_unitary(UNITARY_TOL));
    }

    #[test]
    fn test_adjoint_of_s_gate() {
        let s = UnitaryMatrix::new(
            2,
            vec![
                Complex64::new(1.0, 0.0),
                Complex64::new(0.0, 0.0),
                Complex64::new(0.0, 0.0),
                Complex64::new(0.0, 1.0),
            ],
        )
        .unwrap();
        let sdg = s.adjoint();
        assert_eq!(sdg.get(1, 1), Complex64::new(0.0, -1.0));
        assert!(sdg.is_unitary(UNITARY_TOL));
    }

    #[test]
    fn test_controlled_x_matches_cnot() {
        let x = UnitaryMatrix::from_real(2, &[0.0, 1.0, 1.0, 0.0]).unwrap();
        let cx = x.controlled(1);
        assert_eq!(cx.dim(), 4);
        // Identity on the control=0 block.
        assert_eq!(cx.get(0, 0), Complex64::new(1.0, 0.0));
        assert_eq!(cx.get(1, 1), Complex64::new(1.0, 0.0));
        // X on the control=1 block.
        assert_eq!(cx.get(2, 3), Complex64::new(1.0, 0.0));
        assert_eq!(cx.get(3, 2), Complex64::new(1.0, 0.0));
        assert_eq!(cx.get(2, 2), Complex64::new(0.0, 0.0));
        assert!(cx.is_unitary(UNITARY_TOL));
    }

    #[test]
    fn test_controlled_preserves_unitarity() {
        let ch = hadamard().controlled(2);
        assert_eq!(ch.dim(), 8);
        assert!(ch.is_unitary(UNITARY_TOL));
    }
}
