//! Minimal kernel program representation.
//!
//! A [`Kernel`] is an ordered list of instructions over a fixed qubit
//! register, built through chainable methods that validate qubit indices
//! and custom-operation references up front. The runtime treats kernels as
//! opaque beyond this surface: compilation to a backend's native format is
//! the backend's concern.
//!
//! Parameterization happens through [`Param`]: a rotation angle or a
//! custom-operation parameter is either a literal value or a reference to
//! one of the kernel's argument slots, bound at execution time against the
//! flat [`KernelArg`] sequence supplied by the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::registry::{Modifier, UnitaryEntry, UnitaryRegistry};

/// Identifier of a qubit within a kernel's register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QubitId(pub u32);

/// A typed kernel argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelArg {
    /// Integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// List of floats.
    FloatList(Vec<f64>),
}

impl KernelArg {
    fn type_name(&self) -> &'static str {
        match self {
            KernelArg::Int(_) => "int",
            KernelArg::Float(_) => "float",
            KernelArg::FloatList(_) => "list[float]",
        }
    }
}

/// A scalar parameter: a literal or a kernel-argument slot reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Param {
    /// A literal value.
    Value(f64),
    /// Index into the kernel's argument sequence.
    Arg(usize),
}

impl Param {
    /// Bind against the supplied argument sequence.
    pub fn resolve(&self, args: &[KernelArg]) -> CoreResult<f64> {
        match self {
            Param::Value(v) => Ok(*v),
            Param::Arg(index) => match args.get(*index) {
                Some(KernelArg::Float(f)) => Ok(*f),
                Some(other) => Err(CoreError::ArgumentMismatch {
                    index: *index,
                    reason: format!("has type {}, expected float", other.type_name()),
                }),
                None => Err(CoreError::ArgumentMismatch {
                    index: *index,
                    reason: format!("not provided (kernel received {} arguments)", args.len()),
                }),
            },
        }
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Value(v)
    }
}

/// Built-in gates with fixed semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum StandardGate {
    /// Identity.
    I,
    /// Pauli-X.
    X,
    /// Pauli-Y.
    Y,
    /// Pauli-Z.
    Z,
    /// Hadamard.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger.
    Sdg,
    /// T gate.
    T,
    /// T-dagger.
    Tdg,
    /// Rotation around X.
    Rx(Param),
    /// Rotation around Y.
    Ry(Param),
    /// Rotation around Z.
    Rz(Param),
    /// Controlled-X.
    CX,
    /// Controlled-Y.
    CY,
    /// Controlled-Z.
    CZ,
    /// SWAP.
    Swap,
    /// Toffoli.
    CCX,
}

impl StandardGate {
    /// Gate name.
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::CX => "cx",
            StandardGate::CY => "cy",
            StandardGate::CZ => "cz",
            StandardGate::Swap => "swap",
            StandardGate::CCX => "ccx",
        }
    }
}

/// A reference to a registered custom operation, captured at construction.
///
/// Holding the `Arc<UnitaryEntry>` means a later registry reset cannot
/// invalidate a kernel that was already built.
#[derive(Debug, Clone)]
pub struct CustomOp {
    /// The captured registry entry.
    pub entry: Arc<UnitaryEntry>,
    /// Requested modifier, validated against the entry at construction.
    pub modifier: Option<Modifier>,
    /// Parameters forwarded to the entry's generator, if any.
    pub params: Vec<Param>,
    /// Number of control qubits (leading entries of `qubits`).
    pub num_controls: u32,
}

/// One kernel instruction.
#[derive(Debug, Clone)]
pub enum InstructionKind {
    /// A built-in gate.
    Gate(StandardGate),
    /// A registered custom operation.
    Custom(CustomOp),
    /// Terminal measurement of a qubit.
    Measure,
}

/// An instruction applied to specific qubits.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// What to apply.
    pub kind: InstructionKind,
    /// Operand qubits. For controlled custom operations the controls come
    /// first, then the targets.
    pub qubits: Vec<QubitId>,
}

/// A parameterized quantum program over a fixed-size qubit register.
#[derive(Debug, Clone)]
pub struct Kernel {
    name: String,
    num_qubits: u32,
    instructions: Vec<Instruction>,
}

impl Kernel {
    /// Create an empty kernel over `num_qubits` qubits.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            instructions: Vec::new(),
        }
    }

    /// Kernel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the qubit register.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// The instruction sequence.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    fn check_qubit(&self, qubit: QubitId) -> CoreResult<()> {
        if qubit.0 >= self.num_qubits {
            return Err(CoreError::QubitOutOfRange {
                qubit: qubit.0,
                num_qubits: self.num_qubits,
            });
        }
        Ok(())
    }

    fn push(&mut self, kind: InstructionKind, qubits: Vec<QubitId>) -> CoreResult<&mut Self> {
        for q in &qubits {
            self.check_qubit(*q)?;
        }
        self.instructions.push(Instruction { kind, qubits });
        Ok(self)
    }

    /// Apply a Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::H), vec![qubit])
    }

    /// Apply a Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::X), vec![qubit])
    }

    /// Apply a Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::Y), vec![qubit])
    }

    /// Apply a Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::Z), vec![qubit])
    }

    /// Apply an S gate.
    pub fn s(&mut self, qubit: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::S), vec![qubit])
    }

    /// Apply an S-dagger gate.
    pub fn sdg(&mut self, qubit: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::Sdg), vec![qubit])
    }

    /// Apply a T gate.
    pub fn t(&mut self, qubit: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::T), vec![qubit])
    }

    /// Apply a T-dagger gate.
    pub fn tdg(&mut self, qubit: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::Tdg), vec![qubit])
    }

    /// Apply an X rotation.
    pub fn rx(&mut self, qubit: QubitId, theta: impl Into<Param>) -> CoreResult<&mut Self> {
        self.push(
            InstructionKind::Gate(StandardGate::Rx(theta.into())),
            vec![qubit],
        )
    }

    /// Apply a Y rotation.
    pub fn ry(&mut self, qubit: QubitId, theta: impl Into<Param>) -> CoreResult<&mut Self> {
        self.push(
            InstructionKind::Gate(StandardGate::Ry(theta.into())),
            vec![qubit],
        )
    }

    /// Apply a Z rotation.
    pub fn rz(&mut self, qubit: QubitId, theta: impl Into<Param>) -> CoreResult<&mut Self> {
        self.push(
            InstructionKind::Gate(StandardGate::Rz(theta.into())),
            vec![qubit],
        )
    }

    /// Apply a controlled-X gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::CX), vec![control, target])
    }

    /// Apply a controlled-Y gate.
    pub fn cy(&mut self, control: QubitId, target: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::CY), vec![control, target])
    }

    /// Apply a controlled-Z gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::CZ), vec![control, target])
    }

    /// Apply a SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::Swap), vec![q1, q2])
    }

    /// Apply a Toffoli gate.
    pub fn ccx(&mut self, c1: QubitId, c2: QubitId, target: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Gate(StandardGate::CCX), vec![c1, c2, target])
    }

    /// Measure a single qubit.
    pub fn measure(&mut self, qubit: QubitId) -> CoreResult<&mut Self> {
        self.push(InstructionKind::Measure, vec![qubit])
    }

    /// Measure every qubit in the register.
    pub fn measure_all(&mut self) -> CoreResult<&mut Self> {
        for q in 0..self.num_qubits {
            self.push(InstructionKind::Measure, vec![QubitId(q)])?;
        }
        Ok(self)
    }

    /// Apply a registered custom operation by name.
    ///
    /// The operation is resolved against `registry` now; the kernel keeps
    /// the resolved entry, so later registry mutations do not affect it.
    pub fn custom(
        &mut self,
        registry: &UnitaryRegistry,
        op: &str,
        targets: &[QubitId],
        params: Vec<Param>,
    ) -> CoreResult<&mut Self> {
        self.custom_op(registry, op, None, &[], targets, params)
    }

    /// Apply the adjoint of a registered custom operation.
    pub fn custom_adj(
        &mut self,
        registry: &UnitaryRegistry,
        op: &str,
        targets: &[QubitId],
        params: Vec<Param>,
    ) -> CoreResult<&mut Self> {
        self.custom_op(registry, op, Some(Modifier::Adjoint), &[], targets, params)
    }

    /// Apply a controlled custom operation; `controls` gate the operation
    /// on their |1…1⟩ subspace.
    pub fn custom_ctrl(
        &mut self,
        registry: &UnitaryRegistry,
        op: &str,
        controls: &[QubitId],
        targets: &[QubitId],
        params: Vec<Param>,
    ) -> CoreResult<&mut Self> {
        if controls.is_empty() {
            return Err(CoreError::InvalidOperation {
                name: op.to_string(),
                reason: "controlled application requires at least one control qubit".into(),
            });
        }
        self.custom_op(registry, op, Some(Modifier::Control), controls, targets, params)
    }

    fn custom_op(
        &mut self,
        registry: &UnitaryRegistry,
        op: &str,
        modifier: Option<Modifier>,
        controls: &[QubitId],
        targets: &[QubitId],
        params: Vec<Param>,
    ) -> CoreResult<&mut Self> {
        let entry = registry.resolve(op)?;

        if let Some(m) = modifier {
            if !entry.supports(m) {
                return Err(CoreError::UnsupportedModifier {
                    op: op.to_string(),
                    modifier: m.to_string(),
                });
            }
        }

        // Arity check when the matrix shape is known without invocation;
        // generators are checked at execution time instead.
        if let Some(expected) = entry.num_targets() {
            if targets.len() != expected as usize {
                return Err(CoreError::InvalidOperation {
                    name: op.to_string(),
                    reason: format!(
                        "acts on {expected} target qubit(s), got {}",
                        targets.len()
                    ),
                });
            }
        }

        let mut qubits = Vec::with_capacity(controls.len() + targets.len());
        qubits.extend_from_slice(controls);
        qubits.extend_from_slice(targets);
        self.push(
            InstructionKind::Custom(CustomOp {
                entry,
                modifier,
                params,
                num_controls: controls.len() as u32,
            }),
            qubits,
        )
    }

    /// A copy of this kernel with terminal measurements stripped.
    ///
    /// Used when deriving per-term measurement kernels: basis rotations
    /// must land between the state preparation and the measurements.
    pub fn without_measurements(&self) -> Self {
        Self {
            name: self.name.clone(),
            num_qubits: self.num_qubits,
            instructions: self
                .instructions
                .iter()
                .filter(|i| !matches!(i.kind, InstructionKind::Measure))
                .cloned()
                .collect(),
        }
    }

    /// A two-qubit Bell-pair kernel.
    pub fn bell() -> CoreResult<Self> {
        let mut k = Self::new("bell", 2);
        k.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?.measure_all()?;
        Ok(k)
    }

    /// An n-qubit GHZ kernel.
    pub fn ghz(num_qubits: u32) -> CoreResult<Self> {
        let mut k = Self::new("ghz", num_qubits);
        k.h(QubitId(0))?;
        for q in 1..num_qubits {
            k.cx(QubitId(q - 1), QubitId(q))?;
        }
        k.measure_all()?;
        Ok(k)
    }
}
