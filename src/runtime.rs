//! The operation runtime.
//!
//! A [`Runtime`] owns one backend, tracks every qubit handle it has issued
//! and resolves operations by name:
//!
//! ```text
//!   builder(backend) ──→ register::<O>() ──→ build()
//!                                             │
//!   resolve::<O>() / run::<O>(input) ←────────┘
//! ```
//!
//! ## Contract
//!
//! | Method | Fails with |
//! |--------|-----------|
//! | `resolve()` | `UnresolvedDependency` if the operation or one of its dependencies is not registered |
//! | `run()` | whatever the body returns; fatal errors abort the run |
//! | `allocate()` | `ResourceExhausted` past the live-qubit limit |
//! | `release()` | `InvalidHandle` for stale, foreign or duplicated handles |
//!
//! Every primitive effect is a blocking call under a single lock, so
//! independent runs on clones of one runtime interleave safely as long as
//! they never share qubit handles. A fatal error does not roll anything
//! back: qubits the aborted run still held stay allocated.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::{debug, error, info_span, trace, warn};

use crate::arena::Arena;
use crate::backend::{Backend, Gate};
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::operation::Operation;
use crate::outcome::Outcome;
use crate::primitive;
use crate::qubit::{Qubit, QubitId, QubitRegister, RuntimeId};
use crate::report::{RunReport, RunStats};
use crate::simulator::{DEFAULT_MAX_QUBITS, StateVectorBackend};

struct Shared {
    backend: Box<dyn Backend>,
    arena: Arena,
    stats: RunStats,
}

struct Inner {
    id: RuntimeId,
    backend_name: String,
    config: RuntimeConfig,
    max_qubits: usize,
    registry: FxHashSet<&'static str>,
    shared: Mutex<Shared>,
}

/// Resolves and runs operations against a backend.
///
/// Cloning is cheap and yields another handle to the same runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

/// Configures a [`Runtime`] before any operation can be resolved.
pub struct RuntimeBuilder {
    backend: Box<dyn Backend>,
    config: RuntimeConfig,
    registry: FxHashSet<&'static str>,
}

impl RuntimeBuilder {
    /// Start from a backend with the default configuration.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            config: RuntimeConfig::default(),
            registry: FxHashSet::default(),
        }
    }

    /// Replace the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Make a composite operation resolvable.
    pub fn register<O: Operation>(mut self) -> Self {
        self.registry.insert(O::FULL_NAME);
        self
    }

    /// Validate the configuration and register the primitives the backend
    /// supports.
    pub fn build(self) -> RuntimeResult<Runtime> {
        let capabilities = self.backend.capabilities();
        let max_qubits = self.config.effective_max_qubits(capabilities)?;

        let mut registry = self.registry;
        registry.extend(primitive::BUILTIN);
        for gate in Gate::ALL {
            if capabilities.gate_set.supports(gate) {
                registry.insert(primitive::gate_primitive(gate));
            }
        }

        let id = RuntimeId::next();
        let backend_name = self.backend.name().to_string();
        debug!(
            runtime = %id,
            backend = %backend_name,
            max_qubits,
            operations = registry.len(),
            "runtime built"
        );

        Ok(Runtime {
            inner: Arc::new(Inner {
                id,
                backend_name,
                config: self.config,
                max_qubits,
                registry,
                shared: Mutex::new(Shared {
                    backend: self.backend,
                    arena: Arena::new(),
                    stats: RunStats::default(),
                }),
            }),
        })
    }
}

impl Runtime {
    /// Start building a runtime over `backend`.
    pub fn builder(backend: impl Backend + 'static) -> RuntimeBuilder {
        RuntimeBuilder::new(backend)
    }

    /// Start building a runtime over the built-in state-vector simulator,
    /// sized and seeded from `config`.
    pub fn simulator(config: RuntimeConfig) -> RuntimeBuilder {
        let max_qubits = config.max_qubits.unwrap_or(DEFAULT_MAX_QUBITS);
        let backend = match config.seed {
            Some(seed) => StateVectorBackend::with_seed(max_qubits, seed),
            None => StateVectorBackend::new(max_qubits),
        };
        RuntimeBuilder::new(backend).config(config)
    }

    /// Identity of this runtime.
    pub fn id(&self) -> RuntimeId {
        self.inner.id
    }

    /// Name of the backend.
    pub fn backend_name(&self) -> &str {
        &self.inner.backend_name
    }

    /// Active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Maximum number of simultaneously live qubits.
    pub fn max_qubits(&self) -> usize {
        self.inner.max_qubits
    }

    /// Number of currently live qubits.
    pub fn live_qubits(&self) -> usize {
        self.inner.shared.lock().arena.live_count()
    }

    /// Effect counters since the runtime was built.
    pub fn stats(&self) -> RunStats {
        self.inner.shared.lock().stats
    }

    /// Check if an operation name is resolvable.
    pub fn is_registered(&self, full_name: &str) -> bool {
        self.inner.registry.contains(full_name)
    }

    /// Construct an operation with all of its dependencies resolved.
    pub fn resolve<O: Operation>(&self) -> RuntimeResult<O> {
        if !self.is_registered(O::FULL_NAME) {
            return Err(RuntimeError::UnresolvedDependency(O::FULL_NAME.to_string()));
        }
        trace!(runtime = %self.inner.id, operation = O::FULL_NAME, "resolving");
        O::init(self)
    }

    /// Run an operation to completion. This is the top-level entry point;
    /// operations call each other through [`Operation::apply`].
    ///
    /// The operation is resolved on every call. Resolved operations hold a
    /// handle to the runtime, so they are not cached inside it.
    pub fn run<O: Operation>(&self, input: O::Input<'_>) -> RuntimeResult<O::Output> {
        let span = info_span!("run", operation = O::FULL_NAME, runtime = %self.inner.id);
        let _guard = span.enter();

        let operation = self.resolve::<O>()?;
        let live_before = self.live_qubits();

        match operation.body(input) {
            Ok(output) => {
                let leaked = self.live_qubits().saturating_sub(live_before);
                if leaked > 0 && self.inner.config.warn_on_leak {
                    warn!(leaked, "run returned with qubits still allocated");
                }
                Ok(output)
            }
            Err(err) => {
                if err.is_fatal() {
                    let live = self.live_qubits();
                    error!(error = %err, live, "run aborted; live qubits are left allocated");
                } else {
                    debug!(error = %err, "run failed");
                }
                Err(err)
            }
        }
    }

    /// Run an operation and report timing and effect counts.
    pub fn run_with_report<O: Operation>(
        &self,
        input: O::Input<'_>,
    ) -> RuntimeResult<RunReport<O::Output>> {
        let started_at = Utc::now();
        let before = self.stats();
        let timer = Instant::now();

        let output = self.run::<O>(input)?;

        let elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);
        let stats = self.stats().since(&before);
        Ok(RunReport::new(O::FULL_NAME, output, started_at)
            .with_execution_time(elapsed_ms)
            .with_stats(stats)
            .with_metadata(serde_json::json!({
                "backend": self.inner.backend_name,
                "runtime": self.inner.id.to_string(),
            })))
    }

    /// Run an operation on Tokio's blocking pool.
    ///
    /// Inputs must be owned (`'static`), so operations taking borrowed
    /// qubits can only be run synchronously.
    pub async fn run_async<O>(&self, input: O::Input<'static>) -> RuntimeResult<O::Output>
    where
        O: Operation + 'static,
        O::Input<'static>: Send + 'static,
        O::Output: Send + 'static,
    {
        let runtime = self.clone();
        tokio::task::spawn_blocking(move || runtime.run::<O>(input))
            .await
            .map_err(|e| RuntimeError::Aborted(format!("{}: {e}", O::FULL_NAME)))?
    }

    /// Allocate `count` fresh qubits in `|0⟩`. `allocate(0)` is a no-op.
    pub fn allocate(&self, count: usize) -> RuntimeResult<QubitRegister> {
        if count == 0 {
            return Ok(QubitRegister::default());
        }

        let mut shared = self.inner.shared.lock();
        let live = shared.arena.live_count();
        let available = self.inner.max_qubits.saturating_sub(live);
        if count > available {
            debug!(runtime = %self.inner.id, requested = count, available, "allocation refused");
            return Err(RuntimeError::ResourceExhausted {
                requested: count,
                available,
            });
        }

        let ids = shared.backend.allocate(count)?;
        if ids.len() != count {
            return Err(RuntimeError::Backend(format!(
                "backend returned {} qubits for a request of {count}",
                ids.len()
            )));
        }
        let keys = shared.arena.issue(&ids)?;
        shared.stats.allocated += count as u64;
        debug!(
            runtime = %self.inner.id,
            count,
            live = shared.arena.live_count(),
            "allocated qubits"
        );

        let owner = self.inner.id;
        Ok(QubitRegister::new(
            keys.into_iter().map(|key| Qubit::new(key, owner)).collect(),
        ))
    }

    /// Release a register. Every handle in it becomes invalid.
    ///
    /// Nothing is released unless every handle is live and owned by this
    /// runtime. If the backend refuses the release, the handles stay live.
    pub fn release(&self, register: QubitRegister) -> RuntimeResult<()> {
        if register.is_empty() {
            return Ok(());
        }

        let qubits = register.into_inner();
        for qubit in &qubits {
            self.check_owner(qubit)?;
        }
        let keys: Vec<_> = qubits.iter().map(Qubit::key).collect();
        let ids: Vec<QubitId> = keys.iter().map(|key| key.id).collect();

        let mut shared = self.inner.shared.lock();
        shared.arena.check_release(&keys)?;
        shared.backend.release(&ids)?;
        shared.arena.retire(&keys)?;
        shared.stats.released += ids.len() as u64;
        debug!(
            runtime = %self.inner.id,
            count = ids.len(),
            live = shared.arena.live_count(),
            "released qubits"
        );
        Ok(())
    }

    pub(crate) fn apply_gate(&self, gate: Gate, qubits: &[&Qubit]) -> RuntimeResult<()> {
        if qubits.len() != gate.arity() {
            return Err(RuntimeError::Backend(format!(
                "gate {gate} expects {} qubits, got {}",
                gate.arity(),
                qubits.len()
            )));
        }
        for qubit in qubits {
            self.check_owner(qubit)?;
        }
        if let [first, second] = qubits {
            if first.key() == second.key() {
                return Err(RuntimeError::InvalidHandle(format!(
                    "{gate} operands alias the same qubit {first}"
                )));
            }
        }

        let mut shared = self.inner.shared.lock();
        for qubit in qubits {
            shared.arena.check(qubit.key())?;
        }
        let ids: Vec<QubitId> = qubits.iter().map(|q| q.id()).collect();
        shared.backend.apply(gate, &ids)?;
        shared.stats.gates += 1;
        trace!(runtime = %self.inner.id, %gate, ?ids, "applied gate");
        Ok(())
    }

    pub(crate) fn measure(&self, qubit: &Qubit) -> RuntimeResult<Outcome> {
        self.check_owner(qubit)?;

        let mut shared = self.inner.shared.lock();
        shared.arena.check(qubit.key())?;
        let outcome = shared.backend.measure(qubit.id())?;
        shared.stats.measurements += 1;
        trace!(runtime = %self.inner.id, qubit = %qubit.id(), %outcome, "measured");
        Ok(outcome)
    }

    fn check_owner(&self, qubit: &Qubit) -> RuntimeResult<()> {
        if qubit.owner() == self.inner.id {
            Ok(())
        } else {
            Err(RuntimeError::InvalidHandle(format!(
                "{qubit} was not issued by {}",
                self.inner.id
            )))
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("backend", &self.inner.backend_name)
            .field("max_qubits", &self.inner.max_qubits)
            .field("live_qubits", &self.live_qubits())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;
    use crate::operation::Callable;
    use crate::primitive::{Allocate, H, Measure, Release, X};
    use crate::recording::{Effect, Recording};

    /// Simulator whose `release` always fails.
    struct RefusingRelease {
        inner: StateVectorBackend,
    }

    impl Backend for RefusingRelease {
        fn name(&self) -> &str {
            "refusing-release"
        }

        fn capabilities(&self) -> &Capabilities {
            self.inner.capabilities()
        }

        fn allocate(&mut self, count: usize) -> RuntimeResult<Vec<QubitId>> {
            self.inner.allocate(count)
        }

        fn release(&mut self, _qubits: &[QubitId]) -> RuntimeResult<()> {
            Err(RuntimeError::Backend("device refused release".into()))
        }

        fn apply(&mut self, gate: Gate, qubits: &[QubitId]) -> RuntimeResult<()> {
            self.inner.apply(gate, qubits)
        }

        fn measure(&mut self, qubit: QubitId) -> RuntimeResult<Outcome> {
            self.inner.measure(qubit)
        }
    }

    /// Holds one qubit, then flips a scratch qubit after releasing it.
    struct FlipAfterRelease {
        allocate: Allocate,
        release: Release,
        x: X,
    }

    impl Callable for FlipAfterRelease {
        const NAME: &'static str = "FlipAfterRelease";
        const FULL_NAME: &'static str = "qop.tests.FlipAfterRelease";
    }

    impl Operation for FlipAfterRelease {
        type Input<'q> = ();
        type Output = ();

        fn init(runtime: &Runtime) -> RuntimeResult<Self> {
            Ok(Self {
                allocate: runtime.resolve()?,
                release: runtime.resolve()?,
                x: runtime.resolve()?,
            })
        }

        fn body(&self, _input: Self::Input<'_>) -> RuntimeResult<()> {
            let held = self.allocate.apply(1)?;
            let scratch = self.allocate.apply(1)?;
            let stale = scratch[0].alias();
            self.release.apply(scratch)?;
            self.x.apply(&stale)?;
            self.release.apply(held)
        }
    }

    fn runtime(max_qubits: usize) -> Runtime {
        Runtime::simulator(RuntimeConfig::default().with_max_qubits(max_qubits).with_seed(5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_allocate_and_release() {
        let rt = runtime(4);
        let register = rt.allocate(3).unwrap();
        assert_eq!(register.len(), 3);
        assert_eq!(rt.live_qubits(), 3);
        assert!(register.iter().all(|q| q.owner() == rt.id()));

        rt.release(register).unwrap();
        assert_eq!(rt.live_qubits(), 0);
        assert_eq!(rt.stats().allocated, 3);
        assert_eq!(rt.stats().released, 3);
    }

    #[test]
    fn test_allocate_zero_and_release_empty() {
        let rt = runtime(2);
        let register = rt.allocate(0).unwrap();
        assert!(register.is_empty());
        rt.release(register).unwrap();
        assert_eq!(rt.stats(), RunStats::default());
    }

    #[test]
    fn test_resource_exhausted_is_recoverable() {
        let rt = runtime(2);
        let held = rt.allocate(1).unwrap();

        let err = rt.allocate(2).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            RuntimeError::ResourceExhausted {
                requested: 2,
                available: 1
            }
        ));
        assert_eq!(rt.live_qubits(), 1);

        rt.release(held).unwrap();
        let retried = rt.allocate(2).unwrap();
        assert_eq!(retried.len(), 2);
    }

    #[test]
    fn test_double_release_is_invalid() {
        let rt = runtime(2);
        let register = rt.allocate(1).unwrap();
        let stale = QubitRegister::new(vec![register[0].alias()]);

        rt.release(register).unwrap();
        let err = rt.release(stale).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidHandle(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_use_after_release_is_invalid() {
        let rt = runtime(2);
        let x: X = rt.resolve().unwrap();
        let m: Measure = rt.resolve().unwrap();

        let register = rt.allocate(1).unwrap();
        let stale = register[0].alias();
        rt.release(register).unwrap();

        assert!(matches!(x.apply(&stale), Err(RuntimeError::InvalidHandle(_))));
        assert!(matches!(m.apply(&stale), Err(RuntimeError::InvalidHandle(_))));
    }

    #[test]
    fn test_stale_handle_does_not_reach_reused_slot() {
        let rt = runtime(1);
        let m: Measure = rt.resolve().unwrap();
        let x: X = rt.resolve().unwrap();

        let first = rt.allocate(1).unwrap();
        let stale = first[0].alias();
        rt.release(first).unwrap();

        let second = rt.allocate(1).unwrap();
        assert_eq!(second[0].id(), stale.id());
        assert!(x.apply(&stale).is_err());
        assert_eq!(m.apply(&second[0]).unwrap(), Outcome::Zero);
        rt.release(second).unwrap();
    }

    #[test]
    fn test_foreign_handle_is_invalid() {
        let a = runtime(2);
        let b = runtime(2);
        let register = a.allocate(1).unwrap();

        let h: H = b.resolve().unwrap();
        assert!(matches!(
            h.apply(&register[0]),
            Err(RuntimeError::InvalidHandle(_))
        ));
        assert!(matches!(
            b.release(register),
            Err(RuntimeError::InvalidHandle(_))
        ));
        assert_eq!(a.live_qubits(), 1);
    }

    #[test]
    fn test_release_with_duplicate_is_rejected_whole() {
        let rt = runtime(2);
        let register = rt.allocate(1).unwrap();
        let duplicate = QubitRegister::new(vec![register[0].alias(), register[0].alias()]);

        assert!(rt.release(duplicate).is_err());
        assert_eq!(rt.live_qubits(), 1);
        rt.release(register).unwrap();
    }

    #[test]
    fn test_refused_release_keeps_handles_live() {
        let rt = Runtime::builder(RefusingRelease {
            inner: StateVectorBackend::with_seed(2, 1),
        })
        .build()
        .unwrap();
        let register = rt.allocate(2).unwrap();
        let survivor = register[0].alias();

        let err = rt.release(register).unwrap_err();
        assert!(matches!(err, RuntimeError::Backend(_)));
        assert_eq!(rt.live_qubits(), 2);
        assert_eq!(rt.stats().released, 0);
        assert!(matches!(
            rt.allocate(1),
            Err(RuntimeError::ResourceExhausted {
                requested: 1,
                available: 0
            })
        ));

        let x: X = rt.resolve().unwrap();
        assert!(x.apply(&survivor).is_ok());
    }

    #[test]
    fn test_fatal_error_aborts_run_and_leaves_qubits() {
        let rt = Runtime::simulator(RuntimeConfig::default().with_max_qubits(2).with_seed(3))
            .register::<FlipAfterRelease>()
            .build()
            .unwrap();

        let err = rt.run::<FlipAfterRelease>(()).unwrap_err();
        assert!(err.is_fatal());
        assert!(
            matches!(&err, RuntimeError::InvalidHandle(msg) if msg.contains("already released"))
        );
        assert_eq!(rt.live_qubits(), 1);
        assert_eq!(rt.stats().allocated, 2);
        assert_eq!(rt.stats().released, 1);
        assert_eq!(rt.stats().gates, 0);

        // The runtime stays usable for the remaining capacity.
        let register = rt.allocate(1).unwrap();
        rt.release(register).unwrap();
        assert_eq!(rt.live_qubits(), 1);
    }

    #[test]
    fn test_config_larger_than_backend_is_rejected() {
        let result = Runtime::builder(StateVectorBackend::with_seed(2, 1))
            .config(RuntimeConfig::default().with_max_qubits(3))
            .build();
        assert!(matches!(result, Err(RuntimeError::Configuration(_))));
    }

    #[test]
    fn test_measure_is_recorded_against_backend() {
        let backend = Recording::new(StateVectorBackend::with_seed(2, 9));
        let log = backend.log();
        let rt = Runtime::builder(backend).build().unwrap();
        let h: H = rt.resolve().unwrap();
        let m: Measure = rt.resolve().unwrap();

        let register = rt.allocate(1).unwrap();
        h.apply(&register[0]).unwrap();
        let first = m.apply(&register[0]).unwrap();
        let second = m.apply(&register[0]).unwrap();
        assert_eq!(first, second);

        let measured: Vec<_> = log
            .snapshot()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Measure { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect();
        assert_eq!(measured, vec![first, second]);
    }
}
