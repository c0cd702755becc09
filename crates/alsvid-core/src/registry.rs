//! Registry for dynamically registered custom unitary operations.
//!
//! The [`UnitaryRegistry`] is an explicit object with its own lifecycle:
//! create it, populate it, hand references to kernel builders, and
//! optionally [`reset`](UnitaryRegistry::reset) it between test runs.
//! Registration is serialized through a single writer lock so that
//! auto-generated names never collide.
//!
//! Validation is two-phase:
//!
//! 1. **Registration** — fixed matrices are checked for shape and
//!    unitarity immediately.
//! 2. **Invocation** — parametric generators are only checked when
//!    [`UnitaryEntry::materialize`] is called with concrete parameters,
//!    since their shape is not known until then.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use num_complex::Complex64;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::unitary::{UNITARY_TOL, UnitaryMatrix};

/// Kernel-level modifiers applicable to a custom operation.
///
/// This is a closed set: anything outside it cannot be requested, and an
/// entry may further restrict which of these it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// Conjugate transpose of the resolved matrix.
    Adjoint,
    /// Controlled expansion onto one or more control qubits.
    Control,
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Adjoint => write!(f, "adj"),
            Modifier::Control => write!(f, "ctrl"),
        }
    }
}

/// Generator function for parametric operations.
pub type GeneratorFn = Box<dyn Fn(&[f64]) -> CoreResult<UnitaryMatrix> + Send + Sync>;

/// The payload of a registered operation.
pub enum OperationDef {
    /// A fixed matrix, validated at registration.
    Fixed(UnitaryMatrix),
    /// A parametric generator, validated at each invocation.
    Generator(GeneratorFn),
}

impl fmt::Debug for OperationDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationDef::Fixed(m) => f.debug_tuple("Fixed").field(&m.dim()).finish(),
            OperationDef::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// A registered custom operation.
///
/// Immutable once registered. Kernels capture an `Arc<UnitaryEntry>` at
/// construction, so entries stay alive (and resolved matrices stay valid)
/// even if the registry is reset afterwards.
#[derive(Debug)]
pub struct UnitaryEntry {
    name: String,
    def: OperationDef,
    supported_modifiers: Vec<Modifier>,
}

impl UnitaryEntry {
    /// The unique operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of target qubits, if known without invoking a generator.
    pub fn num_targets(&self) -> Option<u32> {
        match &self.def {
            OperationDef::Fixed(m) => Some(m.num_targets()),
            OperationDef::Generator(_) => None,
        }
    }

    /// Whether the given modifier may be applied to this operation.
    pub fn supports(&self, modifier: Modifier) -> bool {
        self.supported_modifiers.contains(&modifier)
    }

    /// Produce the concrete matrix for the given parameters.
    ///
    /// Fixed operations take no parameters and return a clone. Generators
    /// are invoked and their output re-validated: a generator that returns
    /// a malformed or non-unitary matrix fails here, at invocation time.
    pub fn materialize(&self, params: &[f64]) -> CoreResult<UnitaryMatrix> {
        match &self.def {
            OperationDef::Fixed(m) => {
                if !params.is_empty() {
                    return Err(CoreError::InvalidOperation {
                        name: self.name.clone(),
                        reason: format!(
                            "fixed operation takes no parameters, got {}",
                            params.len()
                        ),
                    });
                }
                Ok(m.clone())
            }
            OperationDef::Generator(generate) => {
                let matrix = generate(params)?;
                if !matrix.is_unitary(UNITARY_TOL) {
                    return Err(CoreError::InvalidOperation {
                        name: self.name.clone(),
                        reason: format!(
                            "generator produced a non-unitary {}x{} matrix for parameters {params:?}",
                            matrix.dim(),
                            matrix.dim()
                        ),
                    });
                }
                Ok(matrix)
            }
        }
    }
}

/// Handle returned by registration, naming the stored operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    name: String,
}

impl OperationHandle {
    /// The name under which the operation was stored.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

struct RegistryInner {
    entries: FxHashMap<String, Arc<UnitaryEntry>>,
    auto_counter: u64,
}

/// Thread-safe store of custom unitary operations.
pub struct UnitaryRegistry {
    inner: RwLock<RegistryInner>,
}

impl UnitaryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                entries: FxHashMap::default(),
                auto_counter: 0,
            }),
        }
    }

    /// Register an operation supporting both modifiers.
    ///
    /// With `name = None` a unique name is generated. Fixed matrices are
    /// validated for unitarity here; registering under an already-taken
    /// name fails.
    pub fn register(
        &self,
        def: OperationDef,
        name: Option<&str>,
    ) -> CoreResult<OperationHandle> {
        self.register_with_modifiers(def, name, vec![Modifier::Adjoint, Modifier::Control])
    }

    /// Register an operation with an explicit set of supported modifiers.
    pub fn register_with_modifiers(
        &self,
        def: OperationDef,
        name: Option<&str>,
        supported_modifiers: Vec<Modifier>,
    ) -> CoreResult<OperationHandle> {
        let mut inner = self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let name = match name {
            Some(n) => {
                if inner.entries.contains_key(n) {
                    return Err(CoreError::InvalidOperation {
                        name: n.to_string(),
                        reason: "an operation with this name is already registered".into(),
                    });
                }
                n.to_string()
            }
            None => loop {
                let candidate = format!("custom_op_{}", inner.auto_counter);
                inner.auto_counter += 1;
                if !inner.entries.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        if let OperationDef::Fixed(matrix) = &def {
            if !matrix.is_unitary(UNITARY_TOL) {
                return Err(CoreError::InvalidOperation {
                    name,
                    reason: format!(
                        "{}x{} matrix is not unitary within {UNITARY_TOL:e}",
                        matrix.dim(),
                        matrix.dim()
                    ),
                });
            }
        }

        debug!(op = %name, "registered custom operation");
        let entry = Arc::new(UnitaryEntry {
            name: name.clone(),
            def,
            supported_modifiers,
        });
        inner.entries.insert(name.clone(), entry);
        Ok(OperationHandle { name })
    }

    /// Register a fixed matrix from raw row-major data.
    ///
    /// Shape violations (non-square data, non-power-of-two dimension) are
    /// reported as [`CoreError::InvalidOperation`] carrying the operation
    /// name.
    pub fn register_matrix(
        &self,
        dim: usize,
        data: Vec<Complex64>,
        name: Option<&str>,
    ) -> CoreResult<OperationHandle> {
        let matrix = UnitaryMatrix::new(dim, data).map_err(|e| match e {
            CoreError::InvalidState { reason } => CoreError::InvalidOperation {
                name: name.unwrap_or("<unnamed>").to_string(),
                reason,
            },
            other => other,
        })?;
        self.register(OperationDef::Fixed(matrix), name)
    }

    /// Look up an operation by name.
    pub fn resolve(&self, name: &str) -> CoreResult<Arc<UnitaryEntry>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::UnknownOperation(name.to_string()))
    }

    /// Whether an operation with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.contains_key(name)
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = inner.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// Clear all registered operations.
    ///
    /// Used between test runs. Kernels and futures holding an
    /// `Arc<UnitaryEntry>` keep their captured operations.
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        debug!(dropped = inner.entries.len(), "registry reset");
        inner.entries.clear();
        inner.auto_counter = 0;
    }
}

impl Default for UnitaryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
