//! Effect recording.
//!
//! [`Recording`] wraps any backend and appends every effect that reaches it
//! to a shared [`EffectLog`]. Hosts use it to audit what a composite did;
//! tests use it to assert exact primitive sequences.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, Gate};
use crate::capability::Capabilities;
use crate::error::RuntimeResult;
use crate::outcome::Outcome;
use crate::qubit::QubitId;

/// One effect issued to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// Qubits were allocated.
    Allocate {
        /// Slots handed out.
        qubits: Vec<QubitId>,
    },
    /// Qubits were released.
    Release {
        /// Slots given back.
        qubits: Vec<QubitId>,
    },
    /// A gate was applied.
    Apply {
        /// The gate.
        gate: Gate,
        /// Operand slots, `[control, target]` for two-qubit gates.
        qubits: Vec<QubitId>,
    },
    /// A qubit was measured.
    Measure {
        /// Measured slot.
        qubit: QubitId,
        /// Observed outcome.
        outcome: Outcome,
    },
}

/// Shared, append-only list of effects.
#[derive(Debug, Clone, Default)]
pub struct EffectLog {
    effects: Arc<Mutex<Vec<Effect>>>,
}

impl EffectLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, effect: Effect) {
        self.effects.lock().push(effect);
    }

    /// Copy out the recorded effects.
    pub fn snapshot(&self) -> Vec<Effect> {
        self.effects.lock().clone()
    }

    /// Recorded gate applications only, in order.
    pub fn gates(&self) -> Vec<(Gate, Vec<QubitId>)> {
        self.effects
            .lock()
            .iter()
            .filter_map(|effect| match effect {
                Effect::Apply { gate, qubits } => Some((*gate, qubits.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded effects.
    pub fn len(&self) -> usize {
        self.effects.lock().len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.effects.lock().is_empty()
    }

    /// Serialize the log as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.effects.lock())
    }
}

/// Backend wrapper that records every successful effect.
pub struct Recording<B> {
    inner: B,
    log: EffectLog,
}

impl<B: Backend> Recording<B> {
    /// Wrap `inner`, recording into a fresh log.
    pub fn new(inner: B) -> Self {
        Self::with_log(inner, EffectLog::new())
    }

    /// Wrap `inner`, recording into an existing log.
    pub fn with_log(inner: B, log: EffectLog) -> Self {
        Self { inner, log }
    }

    /// A handle to the log, usable after the backend moves into a runtime.
    pub fn log(&self) -> EffectLog {
        self.log.clone()
    }

    /// Unwrap the inner backend.
    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: Backend> Backend for Recording<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> &Capabilities {
        self.inner.capabilities()
    }

    fn allocate(&mut self, count: usize) -> RuntimeResult<Vec<QubitId>> {
        let qubits = self.inner.allocate(count)?;
        self.log.push(Effect::Allocate {
            qubits: qubits.clone(),
        });
        Ok(qubits)
    }

    fn release(&mut self, qubits: &[QubitId]) -> RuntimeResult<()> {
        self.inner.release(qubits)?;
        self.log.push(Effect::Release {
            qubits: qubits.to_vec(),
        });
        Ok(())
    }

    fn apply(&mut self, gate: Gate, qubits: &[QubitId]) -> RuntimeResult<()> {
        self.inner.apply(gate, qubits)?;
        self.log.push(Effect::Apply {
            gate,
            qubits: qubits.to_vec(),
        });
        Ok(())
    }

    fn measure(&mut self, qubit: QubitId) -> RuntimeResult<Outcome> {
        let outcome = self.inner.measure(qubit)?;
        self.log.push(Effect::Measure { qubit, outcome });
        Ok(outcome)
    }
}
