//! Statevector simulation engine.

use num_complex::Complex64;
use std::f64::consts::PI;

use alsvid_core::{
    CoreError, CoreResult, CustomOp, Instruction, InstructionKind, Kernel, KernelArg, Modifier,
    Param, QubitId, StandardGate, UnitaryMatrix,
};

/// A statevector representing a pure quantum state.
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let size = 1 << num_qubits;
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); size];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// The current amplitudes.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Consume the statevector, returning the amplitude buffer.
    pub fn into_amplitudes(self) -> Vec<Complex64> {
        self.amplitudes
    }

    /// Run a kernel with its arguments bound.
    pub fn run(&mut self, kernel: &Kernel, args: &[KernelArg]) -> CoreResult<()> {
        for inst in kernel.instructions() {
            self.apply(inst, args)?;
        }
        Ok(())
    }

    /// Apply a single instruction.
    pub fn apply(&mut self, instruction: &Instruction, args: &[KernelArg]) -> CoreResult<()> {
        let qubits: Vec<usize> = instruction.qubits.iter().map(|q| q.0 as usize).collect();
        match &instruction.kind {
            InstructionKind::Gate(gate) => self.apply_standard_gate(gate, &qubits, args),
            InstructionKind::Custom(op) => self.apply_custom(op, &instruction.qubits, args),
            // Measurement is terminal sampling; it doesn't modify the state here.
            InstructionKind::Measure => Ok(()),
        }
    }

    fn apply_standard_gate(
        &mut self,
        gate: &StandardGate,
        qubits: &[usize],
        args: &[KernelArg],
    ) -> CoreResult<()> {
        match gate {
            StandardGate::I => {}
            StandardGate::X => self.apply_x(qubits[0]),
            StandardGate::Y => self.apply_y(qubits[0]),
            StandardGate::Z => self.apply_z(qubits[0]),
            StandardGate::H => self.apply_h(qubits[0]),
            StandardGate::S => self.apply_phase(qubits[0], PI / 2.0),
            StandardGate::Sdg => self.apply_phase(qubits[0], -PI / 2.0),
            StandardGate::T => self.apply_phase(qubits[0], PI / 4.0),
            StandardGate::Tdg => self.apply_phase(qubits[0], -PI / 4.0),
            StandardGate::Rx(theta) => self.apply_rx(qubits[0], theta.resolve(args)?),
            StandardGate::Ry(theta) => self.apply_ry(qubits[0], theta.resolve(args)?),
            StandardGate::Rz(theta) => self.apply_rz(qubits[0], theta.resolve(args)?),
            StandardGate::CX => self.apply_cx(qubits[0], qubits[1]),
            StandardGate::CY => self.apply_cy(qubits[0], qubits[1]),
            StandardGate::CZ => self.apply_cz(qubits[0], qubits[1]),
            StandardGate::Swap => self.apply_swap(qubits[0], qubits[1]),
            StandardGate::CCX => self.apply_ccx(qubits[0], qubits[1], qubits[2]),
        }
        Ok(())
    }

    /// Materialize and apply a custom operation.
    ///
    /// Generators run here, so a parametric operation that produces a bad
    /// matrix fails at invocation time with the operation's name attached.
    fn apply_custom(
        &mut self,
        op: &CustomOp,
        operand_ids: &[QubitId],
        args: &[KernelArg],
    ) -> CoreResult<()> {
        let params: Vec<f64> = op
            .params
            .iter()
            .map(|p: &Param| p.resolve(args))
            .collect::<CoreResult<_>>()?;
        let mut matrix = op.entry.materialize(&params)?;

        matrix = match op.modifier {
            Some(Modifier::Adjoint) => matrix.adjoint(),
            Some(Modifier::Control) => matrix.controlled(op.num_controls),
            None => matrix,
        };

        let operands: Vec<usize> = operand_ids.iter().map(|q| q.0 as usize).collect();
        if matrix.num_targets() as usize != operands.len() {
            return Err(CoreError::InvalidOperation {
                name: op.entry.name().to_string(),
                reason: format!(
                    "matrix acts on {} qubit(s) but {} operand(s) were supplied",
                    matrix.num_targets(),
                    operands.len()
                ),
            });
        }
        self.apply_unitary(&matrix, &operands);
        Ok(())
    }

    /// Apply a dense k-qubit unitary to the given operand qubits.
    ///
    /// Operand 0 is the most significant bit of the matrix row/column
    /// index, so the standard CNOT matrix has operand 0 as the control.
    fn apply_unitary(&mut self, matrix: &UnitaryMatrix, operands: &[usize]) {
        let k = operands.len();
        let d = 1 << k;
        let operand_mask: usize = operands.iter().map(|&q| 1usize << q).sum();

        let mut addrs = vec![0usize; d];
        let mut gathered = vec![Complex64::new(0.0, 0.0); d];

        for base in 0..(1 << self.num_qubits) {
            if base & operand_mask != 0 {
                continue;
            }
            for (m, addr) in addrs.iter_mut().enumerate() {
                let mut a = base;
                for (bit_pos, &q) in operands.iter().enumerate() {
                    if m & (1 << (k - 1 - bit_pos)) != 0 {
                        a |= 1 << q;
                    }
                }
                *addr = a;
            }
            for (m, g) in gathered.iter_mut().enumerate() {
                *g = self.amplitudes[addrs[m]];
            }
            for (r, &addr) in addrs.iter().enumerate() {
                let mut acc = Complex64::new(0.0, 0.0);
                for (c, &g) in gathered.iter().enumerate() {
                    acc += matrix.get(r, c) * g;
                }
                self.amplitudes[addr] = acc;
            }
        }
    }

    // =========================================================================
    // Single-qubit gate implementations
    // =========================================================================

    fn apply_x(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_y(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        let i_val = Complex64::new(0.0, 1.0);
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = -i_val * self.amplitudes[j];
                self.amplitudes[j] = i_val * tmp;
            }
        }
    }

    fn apply_z(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..(1 << self.num_qubits) {
            if i & mask != 0 {
                self.amplitudes[i] = -self.amplitudes[i];
            }
        }
    }

    fn apply_h(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = sqrt2_inv * (a + b);
                self.amplitudes[j] = sqrt2_inv * (a - b);
            }
        }
    }

    fn apply_phase(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let phase = Complex64::from_polar(1.0, theta);
        for i in 0..(1 << self.num_qubits) {
            if i & mask != 0 {
                self.amplitudes[i] *= phase;
            }
        }
    }

    fn apply_rx(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        let neg_i_s = Complex64::new(0.0, -s);
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a + neg_i_s * b;
                self.amplitudes[j] = neg_i_s * a + c * b;
            }
        }
    }

    fn apply_ry(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a - s * b;
                self.amplitudes[j] = s * a + c * b;
            }
        }
    }

    fn apply_rz(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let phase_0 = Complex64::from_polar(1.0, -theta / 2.0);
        let phase_1 = Complex64::from_polar(1.0, theta / 2.0);
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                self.amplitudes[i] *= phase_0;
            } else {
                self.amplitudes[i] *= phase_1;
            }
        }
    }

    // =========================================================================
    // Multi-qubit gate implementations
    // =========================================================================

    fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_cy(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let i_val = Complex64::new(0.0, 1.0);
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = -i_val * self.amplitudes[j];
                self.amplitudes[j] = i_val * tmp;
            }
        }
    }

    fn apply_cz(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask != 0) {
                self.amplitudes[i] = -self.amplitudes[i];
            }
        }
    }

    fn apply_swap(&mut self, q1: usize, q2: usize) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        for i in 0..(1 << self.num_qubits) {
            let b1 = (i & mask1) != 0;
            let b2 = (i & mask2) != 0;
            if b1 && !b2 {
                let j = (i & !mask1) | mask2;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_ccx(&mut self, c1: usize, c2: usize, target: usize) {
        let c1_mask = 1 << c1;
        let c2_mask = 1 << c2;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & c1_mask != 0) && (i & c2_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                self.amplitudes.swap(i, j);
            }
        }
    }

    /// Sample a measurement outcome.
    pub fn sample(&self) -> usize {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let r: f64 = rng.r#gen();

        let mut cumulative = 0.0;
        for (i, amp) in self.amplitudes.iter().enumerate() {
            cumulative += amp.norm_sqr();
            if r < cumulative {
                return i;
            }
        }

        // Fallback (shouldn't happen with normalized states)
        self.amplitudes.len() - 1
    }

    /// Convert a measurement outcome to a bitstring, qubit 0 leftmost.
    pub fn outcome_to_bitstring(&self, outcome: usize) -> String {
        format!("{:0width$b}", outcome, width = self.num_qubits)
            .chars()
            .rev()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvid_core::{OperationDef, UnitaryRegistry};

    fn approx_eq(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-10
    }

    #[test]
    fn test_initial_state() {
        let sv = Statevector::new(2);
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(1.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn test_bell_state() {
        let mut sv = Statevector::new(2);
        sv.run(&Kernel::bell().unwrap(), &[]).unwrap();

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_rx_argument_binding() {
        let mut kernel = Kernel::new("rot", 1);
        kernel.rx(QubitId(0), Param::Arg(0)).unwrap();

        // θ = π flips |0⟩ to -i|1⟩.
        let mut sv = Statevector::new(1);
        sv.run(&kernel, &[KernelArg::Float(PI)]).unwrap();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, -1.0)));
    }

    #[test]
    fn test_missing_argument_fails() {
        let mut kernel = Kernel::new("rot", 1);
        kernel.rx(QubitId(0), Param::Arg(0)).unwrap();
        let mut sv = Statevector::new(1);
        assert!(matches!(
            sv.run(&kernel, &[]).unwrap_err(),
            CoreError::ArgumentMismatch { .. }
        ));
    }

    #[test]
    fn test_custom_unitary_matches_builtin_h() {
        let registry = UnitaryRegistry::new();
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        let h = UnitaryMatrix::from_real(2, &[sqrt2_inv, sqrt2_inv, sqrt2_inv, -sqrt2_inv])
            .unwrap();
        registry.register(OperationDef::Fixed(h), Some("h2")).unwrap();

        let mut kernel = Kernel::new("k", 1);
        kernel.custom(&registry, "h2", &[QubitId(0)], vec![]).unwrap();

        let mut custom = Statevector::new(1);
        custom.run(&kernel, &[]).unwrap();

        let mut builtin = Statevector::new(1);
        builtin.apply_h(0);

        for (a, b) in custom.amplitudes.iter().zip(builtin.amplitudes.iter()) {
            assert!(approx_eq(*a, *b));
        }
    }

    #[test]
    fn test_custom_ctrl_matches_builtin_cx() {
        let registry = UnitaryRegistry::new();
        let x = UnitaryMatrix::from_real(2, &[0.0, 1.0, 1.0, 0.0]).unwrap();
        registry.register(OperationDef::Fixed(x), Some("x2")).unwrap();

        let mut kernel = Kernel::new("k", 2);
        kernel.x(QubitId(0)).unwrap();
        kernel
            .custom_ctrl(&registry, "x2", &[QubitId(0)], &[QubitId(1)], vec![])
            .unwrap();

        let mut sv = Statevector::new(2);
        sv.run(&kernel, &[]).unwrap();

        // |11⟩ = index 3
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(1.0, 0.0)));
    }

    #[test]
    fn test_custom_adjoint_inverts() {
        let registry = UnitaryRegistry::new();
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
        registry.register(OperationDef::Fixed(s), Some("s2")).unwrap();

        let mut kernel = Kernel::new("k", 1);
        kernel.h(QubitId(0)).unwrap();
        kernel.custom(&registry, "s2", &[QubitId(0)], vec![]).unwrap();
        kernel.custom_adj(&registry, "s2", &[QubitId(0)], vec![]).unwrap();

        let mut sv = Statevector::new(1);
        sv.run(&kernel, &[]).unwrap();

        // S†S = I, so the state is back to |+⟩.
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_two_qubit_custom_cnot() {
        let registry = UnitaryRegistry::new();
        let cnot = UnitaryMatrix::from_real(
            4,
            &[
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0, //
                0.0, 0.0, 1.0, 0.0,
            ],
        )
        .unwrap();
        registry.register(OperationDef::Fixed(cnot), Some("my_cnot")).unwrap();

        let mut kernel = Kernel::new("k", 2);
        kernel.h(QubitId(0)).unwrap();
        kernel
            .custom(&registry, "my_cnot", &[QubitId(0), QubitId(1)], vec![])
            .unwrap();

        let mut sv = Statevector::new(2);
        sv.run(&kernel, &[]).unwrap();

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_sample_deterministic() {
        let mut sv = Statevector::new(1);
        sv.apply_x(0);
        for _ in 0..100 {
            assert_eq!(sv.sample(), 1);
        }
    }

    #[test]
    fn test_bitstring_convention() {
        let sv = Statevector::new(3);
        // Outcome 1 = qubit 0 set = leftmost character.
        assert_eq!(sv.outcome_to_bitstring(1), "100");
        assert_eq!(sv.outcome_to_bitstring(4), "001");
    }
}
