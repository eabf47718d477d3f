//! qop-runtime: an operation runtime for composing quantum programs.
//!
//! This crate provides the execution contract between quantum routines and
//! the simulator that computes their effects. Classical control flow
//! (branches, loops, return values) is ordinary Rust; quantum effects go
//! through a small primitive set resolved from a [`Runtime`].
//!
//! # Overview
//!
//! - A [`Backend`] trait: `allocate`, `release`, `apply`, `measure`
//! - [`Qubit`] handles that cannot be copied, checked against a
//!   generation-indexed arena so stale or foreign handles are rejected
//! - The [`Operation`] trait for primitives and composites, with
//!   dependencies resolved once at construction
//! - Primitives: [`Allocate`], [`Release`], [`Measure`], [`H`], [`X`], [`Z`],
//!   [`Cnot`], [`Reset`], [`ResetAll`]
//! - [`RuntimeError`] with configuration, resource and fatal categories
//! - An ideal [`StateVectorBackend`] and a [`Recording`] wrapper
//! - Sample protocols in [`samples`]: Bell test and teleportation
//!
//! # Writing a composite
//!
//! ```
//! use qop_runtime::{
//!     Callable, Measure, Operation, Outcome, Qubit, Runtime, RuntimeConfig, RuntimeResult, X,
//! };
//!
//! /// Flip a qubit and report what it reads afterwards.
//! struct FlipAndRead {
//!     x: X,
//!     m: Measure,
//! }
//!
//! impl Callable for FlipAndRead {
//!     const NAME: &'static str = "FlipAndRead";
//!     const FULL_NAME: &'static str = "demo.FlipAndRead";
//! }
//!
//! impl Operation for FlipAndRead {
//!     type Input<'q> = &'q Qubit;
//!     type Output = Outcome;
//!
//!     fn init(runtime: &Runtime) -> RuntimeResult<Self> {
//!         Ok(Self { x: runtime.resolve()?, m: runtime.resolve()? })
//!     }
//!
//!     fn body(&self, qubit: Self::Input<'_>) -> RuntimeResult<Outcome> {
//!         self.x.apply(qubit)?;
//!         self.m.apply(qubit)
//!     }
//! }
//!
//! let runtime = Runtime::simulator(RuntimeConfig::default().with_max_qubits(1))
//!     .register::<FlipAndRead>()
//!     .build()?;
//! let qubits = runtime.allocate(1)?;
//! assert_eq!(runtime.run::<FlipAndRead>(&qubits[0])?, Outcome::One);
//! # Ok::<(), qop_runtime::RuntimeError>(())
//! ```
//!
//! # Lifecycle
//!
//! ```text
//!   builder(backend) ──→ register::<O>() ──→ build() ──→ run::<O>(input)
//!                                                           │
//!                  allocate ──→ gates / measure ──→ release ┘
//! ```

pub mod backend;
pub mod capability;
pub mod config;
pub mod error;
pub mod operation;
pub mod outcome;
pub mod primitive;
pub mod qubit;
pub mod recording;
pub mod report;
pub mod runtime;
pub mod samples;
pub mod simulator;

mod arena;

pub use backend::{Backend, Gate};
pub use capability::{Capabilities, GateSet};
pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use operation::{Callable, Operation};
pub use outcome::Outcome;
pub use primitive::{Allocate, Cnot, H, Measure, Release, Reset, ResetAll, X, Z};
pub use qubit::{HandleKey, Qubit, QubitId, QubitRegister, RuntimeId};
pub use recording::{Effect, EffectLog, Recording};
pub use report::{RunReport, RunStats};
pub use runtime::{Runtime, RuntimeBuilder};
pub use simulator::StateVectorBackend;
