//! Bell-pair correlation test.
//!
//! [`Set`] drives a qubit to a chosen basis state by measuring it and
//! flipping it when the result disagrees. [`BellTest`] uses it to prepare a
//! pair, entangles the pair with `H` + `CNOT` and counts how often the two
//! measured bits agree. On an ideal backend they always do.

use serde::{Deserialize, Serialize};

use crate::error::RuntimeResult;
use crate::operation::{Callable, Operation};
use crate::outcome::Outcome;
use crate::primitive::{Allocate, Cnot, H, Measure, Release, X};
use crate::qubit::Qubit;
use crate::runtime::{Runtime, RuntimeBuilder};

/// Register [`Set`] and [`BellTest`].
pub fn register(builder: RuntimeBuilder) -> RuntimeBuilder {
    builder.register::<Set>().register::<BellTest>()
}

/// Measure `qubit` and flip it if it is not in `desired`.
pub struct Set {
    m: Measure,
    x: X,
}

impl Callable for Set {
    const NAME: &'static str = "Set";
    const FULL_NAME: &'static str = "qop.samples.bell.Set";
}

impl Operation for Set {
    type Input<'q> = (Outcome, &'q Qubit);
    type Output = ();

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            m: runtime.resolve()?,
            x: runtime.resolve()?,
        })
    }

    fn body(&self, input: Self::Input<'_>) -> RuntimeResult<()> {
        let (desired, qubit) = input;
        let current = self.m.apply(qubit)?;
        if desired != current {
            self.x.apply(qubit)?;
        }
        Ok(())
    }
}

/// Counts collected by [`BellTest`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BellTestResult {
    /// Iterations in which the first qubit measured `Zero`.
    pub zeros: u64,
    /// Iterations in which the first qubit measured `One`.
    pub ones: u64,
    /// Iterations in which both qubits measured the same value.
    pub agree: u64,
}

impl BellTestResult {
    /// Number of iterations.
    pub fn total(&self) -> u64 {
        self.zeros + self.ones
    }

    /// Fraction of agreeing pairs; `0.0` for an empty run.
    #[allow(clippy::cast_precision_loss)]
    pub fn agreement_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.agree as f64 / total as f64,
        }
    }
}

impl From<BellTestResult> for (u64, u64, u64) {
    fn from(result: BellTestResult) -> Self {
        (result.zeros, result.ones, result.agree)
    }
}

/// Prepare, entangle and measure a qubit pair `count` times.
///
/// Input `(count, initial)`: the first qubit starts each iteration in
/// `initial`, the second in `Zero`.
pub struct BellTest {
    set: Set,
    allocate: Allocate,
    release: Release,
    h: H,
    cnot: Cnot,
    m: Measure,
}

impl Callable for BellTest {
    const NAME: &'static str = "BellTest";
    const FULL_NAME: &'static str = "qop.samples.bell.BellTest";
}

impl Operation for BellTest {
    type Input<'q> = (u64, Outcome);
    type Output = BellTestResult;

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            set: runtime.resolve()?,
            allocate: runtime.resolve()?,
            release: runtime.resolve()?,
            h: runtime.resolve()?,
            cnot: runtime.resolve()?,
            m: runtime.resolve()?,
        })
    }

    fn body(&self, input: Self::Input<'_>) -> RuntimeResult<BellTestResult> {
        let (count, initial) = input;
        let mut ones = 0;
        let mut agree = 0;

        let qubits = self.allocate.apply(2)?;
        let (first, second) = (&qubits[0], &qubits[1]);
        for _ in 0..count {
            self.set.apply((initial, first))?;
            self.set.apply((Outcome::Zero, second))?;

            self.h.apply(first)?;
            self.cnot.apply((first, second))?;

            let res = self.m.apply(first)?;
            if self.m.apply(second)? == res {
                agree += 1;
            }
            if res.is_one() {
                ones += 1;
            }

            self.set.apply((Outcome::Zero, first))?;
            self.set.apply((Outcome::Zero, second))?;
        }
        self.release.apply(qubits)?;

        Ok(BellTestResult {
            zeros: count - ones,
            ones,
            agree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Gate;
    use crate::config::RuntimeConfig;
    use crate::error::RuntimeError;
    use crate::recording::{Effect, Recording};
    use crate::simulator::StateVectorBackend;

    fn runtime(seed: u64) -> Runtime {
        register(Runtime::simulator(
            RuntimeConfig::default().with_max_qubits(4).with_seed(seed),
        ))
        .build()
        .unwrap()
    }

    #[test]
    fn test_set_then_measure_yields_desired() {
        let rt = runtime(1);
        let set: Set = rt.resolve().unwrap();
        let h: H = rt.resolve().unwrap();
        let m: Measure = rt.resolve().unwrap();
        let qubits = rt.allocate(1).unwrap();

        for desired in [Outcome::Zero, Outcome::One, Outcome::One, Outcome::Zero] {
            set.apply((desired, &qubits[0])).unwrap();
            assert_eq!(m.apply(&qubits[0]).unwrap(), desired);

            // Also from a superposition.
            h.apply(&qubits[0]).unwrap();
            set.apply((desired, &qubits[0])).unwrap();
            assert_eq!(m.apply(&qubits[0]).unwrap(), desired);
        }
        rt.release(qubits).unwrap();
    }

    #[test]
    fn test_set_only_flips_on_mismatch() {
        let backend = Recording::new(StateVectorBackend::with_seed(1, 1));
        let log = backend.log();
        let rt = register(Runtime::builder(backend)).build().unwrap();
        let set: Set = rt.resolve().unwrap();
        let qubits = rt.allocate(1).unwrap();

        set.apply((Outcome::Zero, &qubits[0])).unwrap();
        assert!(log.gates().is_empty());

        set.apply((Outcome::One, &qubits[0])).unwrap();
        assert_eq!(log.gates(), vec![(Gate::X, vec![qubits[0].id()])]);
    }

    #[test]
    fn test_bell_test_agrees_perfectly() {
        let rt = runtime(2024);
        for initial in [Outcome::Zero, Outcome::One] {
            let result = rt.run::<BellTest>((100, initial)).unwrap();
            assert_eq!(result.zeros + result.ones, 100);
            assert_eq!(result.agree, 100);
            assert!((result.agreement_ratio() - 1.0).abs() < f64::EPSILON);
        }
        assert_eq!(rt.live_qubits(), 0);
    }

    #[test]
    fn test_bell_test_ones_are_balanced() {
        let rt = runtime(99);
        let result = rt.run::<BellTest>((1000, Outcome::Zero)).unwrap();
        assert_eq!(result.total(), 1000);
        assert!(
            (300..=700).contains(&result.ones),
            "ones = {} outside sampling tolerance",
            result.ones
        );
    }

    #[test]
    fn test_bell_test_zero_iterations() {
        let rt = runtime(3);
        let result = rt.run::<BellTest>((0, Outcome::One)).unwrap();
        assert_eq!(result, BellTestResult::default());
        assert_eq!(<(u64, u64, u64)>::from(result), (0, 0, 0));
        assert_eq!(rt.stats().allocated, 2);
        assert_eq!(rt.stats().released, 2);
    }

    #[test]
    fn test_bell_test_effect_sequence() {
        let backend = Recording::new(StateVectorBackend::with_seed(2, 17));
        let log = backend.log();
        let rt = register(Runtime::builder(backend)).build().unwrap();

        rt.run::<BellTest>((1, Outcome::Zero)).unwrap();

        let effects = log.snapshot();
        assert!(matches!(&effects[0], Effect::Allocate { qubits } if qubits.len() == 2));
        assert!(matches!(effects.last(), Some(Effect::Release { qubits }) if qubits.len() == 2));

        let gates: Vec<_> = log.gates().into_iter().map(|(gate, _)| gate).collect();
        let entangling = gates
            .iter()
            .position(|g| *g == Gate::H)
            .expect("H applied");
        assert_eq!(gates[entangling + 1], Gate::Cnot);
    }

    #[test]
    fn test_bell_test_requires_registration() {
        let rt = Runtime::simulator(RuntimeConfig::default().with_max_qubits(2))
            .build()
            .unwrap();
        assert!(matches!(
            rt.run::<BellTest>((1, Outcome::Zero)),
            Err(RuntimeError::UnresolvedDependency(name)) if name == BellTest::FULL_NAME
        ));

        // Registering only the consumer leaves `Set` unresolved.
        let rt = Runtime::simulator(RuntimeConfig::default().with_max_qubits(2))
            .register::<BellTest>()
            .build()
            .unwrap();
        assert!(matches!(
            rt.resolve::<BellTest>(),
            Err(RuntimeError::UnresolvedDependency(name)) if name == Set::FULL_NAME
        ));
    }

    #[test]
    fn test_bell_test_resource_exhausted() {
        let rt = register(Runtime::simulator(
            RuntimeConfig::default().with_max_qubits(1).with_seed(1),
        ))
        .build()
        .unwrap();
        let err = rt.run::<BellTest>((5, Outcome::Zero)).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_bell_test_report() {
        let rt = runtime(8);
        let report = rt.run_with_report::<BellTest>((10, Outcome::Zero)).unwrap();
        assert_eq!(report.operation, BellTest::FULL_NAME);
        assert_eq!(report.output.agree, 10);
        assert_eq!(report.stats.allocated, 2);
        assert_eq!(report.stats.released, 2);
        // H + CNOT per iteration, plus Set corrections.
        assert!(report.stats.gates >= 20);
        assert!(report.execution_time_ms.is_some());
        assert_eq!(report.metadata["backend"], "statevector");
    }

    #[tokio::test]
    async fn test_bell_test_async() {
        let rt = runtime(12);
        let result = rt.run_async::<BellTest>((50, Outcome::One)).await.unwrap();
        assert_eq!(result.agree, 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_use_disjoint_qubits() {
        let rt = runtime(31);
        let runs: Vec<_> = (0..2)
            .map(|_| {
                let rt = rt.clone();
                tokio::spawn(async move { rt.run_async::<BellTest>((200, Outcome::Zero)).await })
            })
            .collect();

        for run in runs {
            let result = run.await.unwrap().unwrap();
            assert_eq!(result.total(), 200);
            assert_eq!(result.agree, 200);
        }
        assert_eq!(rt.live_qubits(), 0);
    }
}
