//! Backend trait and gate vocabulary.
//!
//! The [`Backend`] trait is the only boundary between the runtime and the
//! numerical simulation that actually computes gate effects and measurement
//! probabilities:
//!
//! ```text
//!   allocate(n) ──→ apply(gate, qubits) / measure(qubit) ──→ release(qubits)
//! ```
//!
//! ## Design principles
//!
//! - **Synchronous**: every call blocks until the effect has been applied.
//!   Classical control flow in a composite depends on the returned outcome
//!   of the previous call.
//! - **Slot-addressed**: backends only see [`QubitId`] slots. Ownership and
//!   stale-handle detection live in the runtime, not here.
//! - **Minimal**: only the effects the primitive vocabulary needs.
//!
//! ## Method table
//!
//! | Method | Required | Returns |
//! |--------|----------|---------|
//! | `name()` | yes | `&str` |
//! | `capabilities()` | yes | `&Capabilities` |
//! | `allocate()` | yes | `RuntimeResult<Vec<QubitId>>` |
//! | `release()` | yes | `RuntimeResult<()>` |
//! | `apply()` | yes | `RuntimeResult<()>` |
//! | `measure()` | yes | `RuntimeResult<Outcome>` |

use serde::{Deserialize, Serialize};

use crate::capability::Capabilities;
use crate::error::RuntimeResult;
use crate::outcome::Outcome;
use crate::qubit::QubitId;

/// Trait for simulation backends.
///
/// # Contract
///
/// - `capabilities()` MUST be infallible and cached at construction time.
/// - `allocate(n)` MUST return `n` distinct slots, each in `|0⟩`, or fail
///   with `ResourceExhausted` without allocating anything.
/// - `apply()` receives exactly `gate.arity()` distinct live slots.
/// - `measure()` collapses the qubit; measuring again without an
///   intervening gate MUST return the same outcome.
/// - `release()` drops the slots from the simulated state; they may be
///   handed out again by a later `allocate`.
pub trait Backend: Send {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Get the capabilities of this backend.
    fn capabilities(&self) -> &Capabilities;

    /// Allocate `count` fresh qubits in `|0⟩`.
    fn allocate(&mut self, count: usize) -> RuntimeResult<Vec<QubitId>>;

    /// Release previously allocated qubits.
    fn release(&mut self, qubits: &[QubitId]) -> RuntimeResult<()>;

    /// Apply a unitary gate. Two-qubit gates take `[control, target]`.
    fn apply(&mut self, gate: Gate, qubits: &[QubitId]) -> RuntimeResult<()>;

    /// Measure one qubit in the computational basis.
    fn measure(&mut self, qubit: QubitId) -> RuntimeResult<Outcome>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn capabilities(&self) -> &Capabilities {
        (**self).capabilities()
    }

    fn allocate(&mut self, count: usize) -> RuntimeResult<Vec<QubitId>> {
        (**self).allocate(count)
    }

    fn release(&mut self, qubits: &[QubitId]) -> RuntimeResult<()> {
        (**self).release(qubits)
    }

    fn apply(&mut self, gate: Gate, qubits: &[QubitId]) -> RuntimeResult<()> {
        (**self).apply(gate, qubits)
    }

    fn measure(&mut self, qubit: QubitId) -> RuntimeResult<Outcome> {
        (**self).measure(qubit)
    }
}

/// The fixed vocabulary of unitary gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gate {
    /// Hadamard.
    H,
    /// Pauli X (bit flip).
    X,
    /// Pauli Z (phase flip).
    Z,
    /// Controlled NOT, `[control, target]`.
    Cnot,
}

impl Gate {
    /// Every gate in the vocabulary.
    pub const ALL: [Gate; 4] = [Gate::H, Gate::X, Gate::Z, Gate::Cnot];

    /// Number of qubits the gate acts on.
    pub fn arity(self) -> usize {
        match self {
            Gate::H | Gate::X | Gate::Z => 1,
            Gate::Cnot => 2,
        }
    }

    /// OpenQASM 3 name of the gate.
    pub fn name(self) -> &'static str {
        match self {
            Gate::H => "h",
            Gate::X => "x",
            Gate::Z => "z",
            Gate::Cnot => "cx",
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
