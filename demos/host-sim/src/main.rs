//! Host program driving the sample protocols.
//!
//! This example demonstrates how a host supplies its own backend to the
//! runtime: here a thin wrapper that counts calls before delegating to the
//! built-in state-vector simulator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use qop_runtime::samples::bell::BellTest;
use qop_runtime::samples::teleportation::TeleportClassicalMessage;
use qop_runtime::{
    Backend, Callable, Capabilities, Gate, Outcome, QubitId, Runtime, RuntimeConfig,
    RuntimeResult, StateVectorBackend, samples,
};
use tracing_subscriber::EnvFilter;

/// Call counters shared with the host after the backend moves into the runtime.
#[derive(Default)]
struct CallCounts {
    allocations: AtomicU64,
    gates: AtomicU64,
    measurements: AtomicU64,
}

/// Backend wrapper that counts calls.
struct CountingBackend {
    inner: StateVectorBackend,
    counts: Arc<CallCounts>,
}

impl CountingBackend {
    fn new(inner: StateVectorBackend) -> (Self, Arc<CallCounts>) {
        let counts = Arc::new(CallCounts::default());
        (
            Self {
                inner,
                counts: Arc::clone(&counts),
            },
            counts,
        )
    }
}

impl Backend for CountingBackend {
    fn name(&self) -> &str {
        "counting-statevector"
    }

    fn capabilities(&self) -> &Capabilities {
        self.inner.capabilities()
    }

    fn allocate(&mut self, count: usize) -> RuntimeResult<Vec<QubitId>> {
        self.counts.allocations.fetch_add(1, Ordering::Relaxed);
        self.inner.allocate(count)
    }

    fn release(&mut self, qubits: &[QubitId]) -> RuntimeResult<()> {
        self.inner.release(qubits)
    }

    fn apply(&mut self, gate: Gate, qubits: &[QubitId]) -> RuntimeResult<()> {
        self.counts.gates.fetch_add(1, Ordering::Relaxed);
        self.inner.apply(gate, qubits)
    }

    fn measure(&mut self, qubit: QubitId) -> RuntimeResult<Outcome> {
        self.counts.measurements.fetch_add(1, Ordering::Relaxed);
        self.inner.measure(qubit)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(json) => RuntimeConfig::from_json(&json)?,
        None => RuntimeConfig::default(),
    };

    let inner = match config.seed {
        Some(seed) => StateVectorBackend::with_seed(8, seed),
        None => StateVectorBackend::new(8),
    };
    let features = inner.capabilities().features.join(", ");
    if !inner.capabilities().has_feature("mid_circuit_measurement") {
        return Err("teleportation needs mid-circuit measurement".into());
    }
    let (backend, counts) = CountingBackend::new(inner);
    let runtime = samples::register_all(Runtime::builder(backend).config(config)).build()?;

    println!("Backend:  {}", runtime.backend_name());
    println!("Qubits:   {}", runtime.max_qubits());
    println!("Features: {features}");
    for name in [BellTest::FULL_NAME, TeleportClassicalMessage::FULL_NAME] {
        println!("  {name}: registered={}", runtime.is_registered(name));
    }
    println!();

    // Bell test, both initial states.
    for initial in [Outcome::Zero, Outcome::One] {
        let result = runtime.run_async::<BellTest>((1000, initial)).await?;
        println!(
            "Init:{initial:<4} 0s={:<4} 1s={:<4} agree={:<4}",
            result.zeros, result.ones, result.agree
        );
    }
    println!();

    // Teleportation round trips.
    for message in [true, false, true] {
        let report = runtime.run_with_report::<TeleportClassicalMessage>(message)?;
        println!(
            "Sent {message:<5} received {:<5} ({} gates, {} measurements)",
            report.output, report.stats.gates, report.stats.measurements
        );
    }
    println!();

    println!("Backend calls:");
    println!("  allocate: {}", counts.allocations.load(Ordering::Relaxed));
    println!("  gates:    {}", counts.gates.load(Ordering::Relaxed));
    println!("  measure:  {}", counts.measurements.load(Ordering::Relaxed));
    println!();
    println!("Runtime stats: {}", serde_json::to_string(&runtime.stats())?);

    Ok(())
}
