//! Ideal state-vector backend.
//!
//! A dense, noiseless simulator used as the reference implementation of the
//! [`Backend`] contract. It grows and shrinks with the set of live qubits:
//!
//!   - `allocate` tensors a fresh `|0⟩` onto the most-significant end,
//!   - `release` collapses the qubit, rotates it back to `|0⟩` and compacts
//!     it out of the vector,
//!   - slot ids are reused lowest-first.
//!
//! Bit position `k` of a basis index corresponds to `positions[k]`.

use std::collections::BTreeSet;

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::{Backend, Gate};
use crate::capability::{Capabilities, GateSet};
use crate::error::{RuntimeError, RuntimeResult};
use crate::outcome::Outcome;
use crate::qubit::QubitId;

/// Default upper bound on live qubits (2^20 amplitudes, 16 MiB).
pub const DEFAULT_MAX_QUBITS: usize = 20;

/// Hard upper bound; beyond this the amplitude vector stops fitting in memory.
pub const MAX_SUPPORTED_QUBITS: usize = 30;

/// Probabilities within this distance of 0 or 1 are treated as certain.
const CERTAINTY_EPS: f64 = 1e-10;

/// Noiseless dense state-vector simulator.
pub struct StateVectorBackend {
    capabilities: Capabilities,
    amplitudes: Vec<Complex64>,
    positions: Vec<QubitId>,
    free: BTreeSet<u32>,
    next_id: u32,
    rng: StdRng,
}

impl StateVectorBackend {
    /// Create a simulator seeded from the operating system.
    pub fn new(max_qubits: usize) -> Self {
        Self::with_rng(max_qubits, StdRng::from_os_rng())
    }

    /// Create a simulator with a fixed seed for reproducible outcomes.
    pub fn with_seed(max_qubits: usize, seed: u64) -> Self {
        Self::with_rng(max_qubits, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_qubits: usize, rng: StdRng) -> Self {
        let max_qubits = max_qubits.min(MAX_SUPPORTED_QUBITS);
        Self {
            capabilities: Capabilities::simulator(max_qubits),
            amplitudes: vec![Complex64::new(1.0, 0.0)],
            positions: Vec::new(),
            free: BTreeSet::new(),
            next_id: 0,
            rng,
        }
    }

    /// Advertise a reduced gate set, e.g. to mimic a restricted device.
    pub fn with_gate_set(mut self, gate_set: GateSet) -> Self {
        self.capabilities.gate_set = gate_set;
        self
    }

    /// Number of qubits currently in the state.
    pub fn num_qubits(&self) -> usize {
        self.positions.len()
    }

    /// Probability of measuring `One` on `qubit`, without collapsing.
    pub fn probability_one(&self, qubit: QubitId) -> RuntimeResult<f64> {
        let mask = 1usize << self.position(qubit)?;
        Ok(self.marginal_one(mask))
    }

    fn position(&self, qubit: QubitId) -> RuntimeResult<usize> {
        self.positions
            .iter()
            .position(|&q| q == qubit)
            .ok_or_else(|| RuntimeError::Backend(format!("{qubit} is not allocated")))
    }

    fn marginal_one(&self, mask: usize) -> f64 {
        self.amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & mask != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum()
    }

    /// Apply `f` to every amplitude pair that differs only in bit `mask`.
    fn for_each_pair(
        &mut self,
        mask: usize,
        f: impl Fn(Complex64, Complex64) -> (Complex64, Complex64),
    ) {
        for i in 0..self.amplitudes.len() {
            if i & mask == 0 {
                let j = i | mask;
                let (a0, a1) = f(self.amplitudes[i], self.amplitudes[j]);
                self.amplitudes[i] = a0;
                self.amplitudes[j] = a1;
            }
        }
    }

    fn apply_single(&mut self, gate: Gate, mask: usize) {
        match gate {
            Gate::H => {
                let s = std::f64::consts::FRAC_1_SQRT_2;
                self.for_each_pair(mask, |a0, a1| ((a0 + a1) * s, (a0 - a1) * s));
            }
            Gate::X => self.for_each_pair(mask, |a0, a1| (a1, a0)),
            Gate::Z => self.for_each_pair(mask, |a0, a1| (a0, -a1)),
            Gate::Cnot => unreachable!("two-qubit gate routed to single-qubit path"),
        }
    }

    fn apply_cnot(&mut self, control: usize, target: usize) {
        for i in 0..self.amplitudes.len() {
            if i & control != 0 && i & target == 0 {
                self.amplitudes.swap(i, i | target);
            }
        }
    }

    /// Project onto `outcome` for bit `mask` and renormalize.
    fn collapse(&mut self, mask: usize, outcome: Outcome, probability: f64) {
        let norm = probability.sqrt();
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if (i & mask != 0) == outcome.is_one() {
                *amp /= norm;
            } else {
                *amp = Complex64::new(0.0, 0.0);
            }
        }
    }

    fn sample(&mut self, mask: usize) -> Outcome {
        let p_one = self.marginal_one(mask);
        let outcome = if p_one <= CERTAINTY_EPS {
            Outcome::Zero
        } else if p_one >= 1.0 - CERTAINTY_EPS {
            Outcome::One
        } else {
            Outcome::from(self.rng.random::<f64>() < p_one)
        };
        let probability = if outcome.is_one() { p_one } else { 1.0 - p_one };
        self.collapse(mask, outcome, probability);
        outcome
    }

    /// Drop bit `pos` from the state. The qubit must already be in `|0⟩`.
    fn remove_bit(&mut self, pos: usize) {
        let low = (1usize << pos) - 1;
        let half = self.amplitudes.len() / 2;
        let compacted = (0..half)
            .map(|j| self.amplitudes[((j & !low) << 1) | (j & low)])
            .collect();
        self.amplitudes = compacted;
        self.positions.remove(pos);
    }
}

impl Backend for StateVectorBackend {
    fn name(&self) -> &str {
        &self.capabilities.name
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn allocate(&mut self, count: usize) -> RuntimeResult<Vec<QubitId>> {
        let available = self.capabilities.max_qubits - self.positions.len();
        if count > available {
            return Err(RuntimeError::ResourceExhausted {
                requested: count,
                available,
            });
        }

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let id = match self.free.pop_first() {
                Some(id) => id,
                None => {
                    self.next_id += 1;
                    self.next_id - 1
                }
            };
            let dim = self.amplitudes.len();
            self.amplitudes.resize(dim * 2, Complex64::new(0.0, 0.0));
            self.positions.push(QubitId(id));
            ids.push(QubitId(id));
        }
        Ok(ids)
    }

    fn release(&mut self, qubits: &[QubitId]) -> RuntimeResult<()> {
        for &qubit in qubits {
            let pos = self.position(qubit)?;
            let mask = 1usize << pos;
            if self.sample(mask).is_one() {
                self.apply_single(Gate::X, mask);
            }
            self.remove_bit(pos);
            self.free.insert(qubit.0);
        }
        Ok(())
    }

    fn apply(&mut self, gate: Gate, qubits: &[QubitId]) -> RuntimeResult<()> {
        if qubits.len() != gate.arity() {
            return Err(RuntimeError::Backend(format!(
                "gate {gate} expects {} qubits, got {}",
                gate.arity(),
                qubits.len()
            )));
        }
        match gate {
            Gate::Cnot => {
                let control = self.position(qubits[0])?;
                let target = self.position(qubits[1])?;
                if control == target {
                    return Err(RuntimeError::Backend(
                        "cx control and target must differ".into(),
                    ));
                }
                self.apply_cnot(1 << control, 1 << target);
            }
            single => {
                let pos = self.position(qubits[0])?;
                self.apply_single(single, 1 << pos);
            }
        }
        Ok(())
    }

    fn measure(&mut self, qubit: QubitId) -> RuntimeResult<Outcome> {
        let mask = 1usize << self.position(qubit)?;
        Ok(self.sample(mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_allocate_starts_in_zero() {
        let mut sim = StateVectorBackend::with_seed(4, 1);
        let ids = sim.allocate(3).unwrap();
        assert_eq!(ids, vec![QubitId(0), QubitId(1), QubitId(2)]);
        for id in ids {
            assert_close(sim.probability_one(id).unwrap(), 0.0);
            assert_eq!(sim.measure(id).unwrap(), Outcome::Zero);
        }
    }

    #[test]
    fn test_allocate_zero_is_noop() {
        let mut sim = StateVectorBackend::with_seed(2, 1);
        assert!(sim.allocate(0).unwrap().is_empty());
        assert_eq!(sim.num_qubits(), 0);
        assert!(sim.release(&[]).is_ok());
    }

    #[test]
    fn test_allocate_beyond_capacity() {
        let mut sim = StateVectorBackend::with_seed(2, 1);
        sim.allocate(1).unwrap();
        let err = sim.allocate(2).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::ResourceExhausted {
                requested: 2,
                available: 1
            }
        ));
        assert_eq!(sim.num_qubits(), 1);
    }

    #[test]
    fn test_x_flips() {
        let mut sim = StateVectorBackend::with_seed(1, 1);
        let q = sim.allocate(1).unwrap()[0];
        sim.apply(Gate::X, &[q]).unwrap();
        assert_eq!(sim.measure(q).unwrap(), Outcome::One);
    }

    #[test]
    fn test_h_gives_even_superposition() {
        let mut sim = StateVectorBackend::with_seed(1, 1);
        let q = sim.allocate(1).unwrap()[0];
        sim.apply(Gate::H, &[q]).unwrap();
        assert_close(sim.probability_one(q).unwrap(), 0.5);
    }

    #[test]
    fn test_hzh_is_x() {
        let mut sim = StateVectorBackend::with_seed(1, 1);
        let q = sim.allocate(1).unwrap()[0];
        sim.apply(Gate::H, &[q]).unwrap();
        sim.apply(Gate::Z, &[q]).unwrap();
        sim.apply(Gate::H, &[q]).unwrap();
        assert_close(sim.probability_one(q).unwrap(), 1.0);
    }

    #[test]
    fn test_measurement_is_idempotent() {
        let mut sim = StateVectorBackend::with_seed(1, 42);
        let q = sim.allocate(1).unwrap()[0];
        for _ in 0..50 {
            sim.apply(Gate::H, &[q]).unwrap();
            let first = sim.measure(q).unwrap();
            for _ in 0..5 {
                assert_eq!(sim.measure(q).unwrap(), first);
            }
        }
    }

    #[test]
    fn test_bell_pair_correlates() {
        let mut sim = StateVectorBackend::with_seed(2, 7);
        for _ in 0..100 {
            let ids = sim.allocate(2).unwrap();
            sim.apply(Gate::H, &[ids[0]]).unwrap();
            sim.apply(Gate::Cnot, &[ids[0], ids[1]]).unwrap();
            let a = sim.measure(ids[0]).unwrap();
            let b = sim.measure(ids[1]).unwrap();
            assert_eq!(a, b);
            sim.release(&ids).unwrap();
        }
    }

    #[test]
    fn test_release_compacts_and_reuses_ids() {
        let mut sim = StateVectorBackend::with_seed(3, 1);
        let ids = sim.allocate(3).unwrap();
        sim.apply(Gate::X, &[ids[2]]).unwrap();
        sim.release(&[ids[1]]).unwrap();

        assert_eq!(sim.num_qubits(), 2);
        assert_close(sim.probability_one(ids[0]).unwrap(), 0.0);
        assert_close(sim.probability_one(ids[2]).unwrap(), 1.0);
        assert!(sim.measure(ids[1]).is_err());

        let reused = sim.allocate(1).unwrap();
        assert_eq!(reused, vec![ids[1]]);
        assert_close(sim.probability_one(reused[0]).unwrap(), 0.0);
    }

    #[test]
    fn test_release_of_excited_qubit_keeps_state_normalized() {
        let mut sim = StateVectorBackend::with_seed(2, 3);
        let ids = sim.allocate(2).unwrap();
        sim.apply(Gate::H, &[ids[0]]).unwrap();
        sim.apply(Gate::X, &[ids[1]]).unwrap();
        sim.release(&[ids[1]]).unwrap();

        let total: f64 = sim.amplitudes.iter().map(|a| a.norm_sqr()).sum();
        assert_close(total, 1.0);
        assert_close(sim.probability_one(ids[0]).unwrap(), 0.5);
    }

    #[test]
    fn test_cnot_rejects_same_qubit() {
        let mut sim = StateVectorBackend::with_seed(1, 1);
        let q = sim.allocate(1).unwrap()[0];
        assert!(sim.apply(Gate::Cnot, &[q, q]).is_err());
        assert!(sim.apply(Gate::H, &[]).is_err());
    }
}
