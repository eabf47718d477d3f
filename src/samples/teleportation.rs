//! Quantum teleportation.
//!
//! [`Teleport`] moves the state of a message qubit onto a destination qubit
//! using one borrowed ancilla, two measurements and classically controlled
//! `Z`/`X` corrections. The message qubit's state is destroyed in the
//! process. [`TeleportClassicalMessage`] encodes a bool as a basis state,
//! teleports it and reads it back.

use crate::error::RuntimeResult;
use crate::operation::{Callable, Operation};
use crate::primitive::{Allocate, Cnot, H, Measure, Release, Reset, ResetAll, X, Z};
use crate::qubit::Qubit;
use crate::runtime::{Runtime, RuntimeBuilder};

/// Register [`Teleport`] and [`TeleportClassicalMessage`].
pub fn register(builder: RuntimeBuilder) -> RuntimeBuilder {
    builder
        .register::<Teleport>()
        .register::<TeleportClassicalMessage>()
}

/// Send the state of `msg` to `there`.
///
/// Input `(msg, there)`: both live and owned by the caller; `there` is
/// expected to start in `|0⟩`.
pub struct Teleport {
    allocate: Allocate,
    release: Release,
    h: H,
    cnot: Cnot,
    m: Measure,
    x: X,
    z: Z,
    reset: Reset,
}

impl Callable for Teleport {
    const NAME: &'static str = "Teleport";
    const FULL_NAME: &'static str = "qop.samples.teleportation.Teleport";
}

impl Operation for Teleport {
    type Input<'q> = (&'q Qubit, &'q Qubit);
    type Output = ();

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            allocate: runtime.resolve()?,
            release: runtime.resolve()?,
            h: runtime.resolve()?,
            cnot: runtime.resolve()?,
            m: runtime.resolve()?,
            x: runtime.resolve()?,
            z: runtime.resolve()?,
            reset: runtime.resolve()?,
        })
    }

    fn body(&self, input: Self::Input<'_>) -> RuntimeResult<()> {
        let (msg, there) = input;
        let register = self.allocate.apply(1)?;
        let here = &register[0];

        // Share a Bell pair between `here` and `there`.
        self.h.apply(here)?;
        self.cnot.apply((here, there))?;

        // Bell-basis measurement of `msg` and `here`.
        self.cnot.apply((msg, here))?;
        self.h.apply(msg)?;

        if self.m.apply(msg)?.is_one() {
            self.z.apply(there)?;
        }
        if self.m.apply(here)?.is_one() {
            self.x.apply(there)?;
        }

        self.reset.apply(here)?;
        self.release.apply(register)
    }
}

/// Teleport a classical bit and return what arrives.
pub struct TeleportClassicalMessage {
    teleport: Teleport,
    allocate: Allocate,
    release: Release,
    m: Measure,
    x: X,
    reset_all: ResetAll,
}

impl Callable for TeleportClassicalMessage {
    const NAME: &'static str = "TeleportClassicalMessage";
    const FULL_NAME: &'static str = "qop.samples.teleportation.TeleportClassicalMessage";
}

impl Operation for TeleportClassicalMessage {
    type Input<'q> = bool;
    type Output = bool;

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            teleport: runtime.resolve()?,
            allocate: runtime.resolve()?,
            release: runtime.resolve()?,
            m: runtime.resolve()?,
            x: runtime.resolve()?,
            reset_all: runtime.resolve()?,
        })
    }

    fn body(&self, message: Self::Input<'_>) -> RuntimeResult<bool> {
        let register = self.allocate.apply(2)?;
        let (msg, there) = (&register[0], &register[1]);

        if message {
            self.x.apply(msg)?;
        }
        self.teleport.apply((msg, there))?;
        let measurement = self.m.apply(there)?.is_one();

        self.reset_all.apply(&register)?;
        self.release.apply(register)?;
        Ok(measurement)
    }
}
