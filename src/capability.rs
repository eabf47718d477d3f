//! Backend capability introspection.
//!
//! A backend describes what it can do with [`Capabilities`]: how many live
//! qubits it can hold and which gates it implements. The runtime reads these
//! once, at build time, to decide which gate primitives it can resolve and
//! how far `allocate` may go.

use serde::{Deserialize, Serialize};

use crate::backend::Gate;

/// Hardware or simulator capabilities of a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    /// Name of the backend.
    pub name: String,
    /// Maximum number of simultaneously live qubits.
    pub max_qubits: usize,
    /// Supported gate set (OpenQASM 3 naming convention).
    pub gate_set: GateSet,
    /// Whether this is a simulator (not real hardware).
    pub is_simulator: bool,
    /// Additional features supported by this backend.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl Capabilities {
    /// Create capabilities for a state-vector simulator.
    pub fn simulator(max_qubits: usize) -> Self {
        Self {
            name: "statevector".into(),
            max_qubits,
            gate_set: GateSet::standard(),
            is_simulator: true,
            features: vec!["statevector".into(), "mid_circuit_measurement".into()],
        }
    }

    /// Override the gate set.
    pub fn with_gate_set(mut self, gate_set: GateSet) -> Self {
        self.gate_set = gate_set;
        self
    }

    /// Override the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check if a named feature is advertised.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Gate set supported by a backend.
///
/// Gate names follow the OpenQASM 3 naming convention (lowercase):
/// `h`, `x`, `z`, `cx`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateSet {
    /// Single-qubit gates supported.
    pub single_qubit: Vec<String>,
    /// Two-qubit gates supported.
    pub two_qubit: Vec<String>,
}

impl GateSet {
    /// The full primitive vocabulary: `h`, `x`, `z` and `cx`.
    pub fn standard() -> Self {
        Self::from_gates(&Gate::ALL)
    }

    /// Build a gate set from a list of gates, sorted by arity.
    pub fn from_gates(gates: &[Gate]) -> Self {
        let mut set = Self::default();
        for gate in gates {
            let bucket = match gate.arity() {
                1 => &mut set.single_qubit,
                _ => &mut set.two_qubit,
            };
            if !bucket.iter().any(|g| g == gate.name()) {
                bucket.push(gate.name().into());
            }
        }
        set
    }

    /// Check if a gate is supported by name.
    pub fn contains(&self, gate: &str) -> bool {
        self.single_qubit.iter().any(|g| g == gate) || self.two_qubit.iter().any(|g| g == gate)
    }

    /// Check if a gate is supported.
    pub fn supports(&self, gate: Gate) -> bool {
        self.contains(gate.name())
    }
}
