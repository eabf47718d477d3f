//! The primitive operation set.
//!
//! | Primitive | Input | Output |
//! |-----------|-------|--------|
//! | [`Allocate`] | `usize` | [`QubitRegister`] |
//! | [`Release`] | [`QubitRegister`] | `()` |
//! | [`Measure`] | `&Qubit` | [`Outcome`] |
//! | [`H`], [`X`], [`Z`] | `&Qubit` | `()` |
//! | [`Cnot`] | `(&Qubit, &Qubit)` | `()` |
//! | [`Reset`] | `&Qubit` | `()` |
//! | [`ResetAll`] | `&QubitRegister` | `()` |
//!
//! Gate primitives resolve only when the backend's gate set contains the
//! gate. `Reset` and `ResetAll` are built from `Measure` and `X`.

use crate::backend::Gate;
use crate::error::RuntimeResult;
use crate::operation::{Callable, Operation};
use crate::outcome::Outcome;
use crate::qubit::{Qubit, QubitRegister};
use crate::runtime::Runtime;

macro_rules! callable {
    ($ty:ident, $name:literal) => {
        impl Callable for $ty {
            const NAME: &'static str = $name;
            const FULL_NAME: &'static str = concat!("qop.primitive.", $name);
        }
    };
}

macro_rules! single_qubit_gate {
    ($(#[$meta:meta])* $ty:ident, $name:literal, $gate:expr) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $ty {
            runtime: Runtime,
        }

        callable!($ty, $name);

        impl Operation for $ty {
            type Input<'q> = &'q Qubit;
            type Output = ();

            fn init(runtime: &Runtime) -> RuntimeResult<Self> {
                Ok(Self {
                    runtime: runtime.clone(),
                })
            }

            fn body(&self, qubit: Self::Input<'_>) -> RuntimeResult<()> {
                self.runtime.apply_gate($gate, &[qubit])
            }
        }
    };
}

single_qubit_gate!(
    /// Hadamard gate.
    H,
    "H",
    Gate::H
);
single_qubit_gate!(
    /// Pauli X (bit flip).
    X,
    "X",
    Gate::X
);
single_qubit_gate!(
    /// Pauli Z (phase flip).
    Z,
    "Z",
    Gate::Z
);

/// Controlled NOT, input `(control, target)`.
#[derive(Clone)]
pub struct Cnot {
    runtime: Runtime,
}

callable!(Cnot, "CNOT");

impl Operation for Cnot {
    type Input<'q> = (&'q Qubit, &'q Qubit);
    type Output = ();

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            runtime: runtime.clone(),
        })
    }

    fn body(&self, input: Self::Input<'_>) -> RuntimeResult<()> {
        let (control, target) = input;
        self.runtime.apply_gate(Gate::Cnot, &[control, target])
    }
}

/// Computational-basis measurement. The qubit stays allocated.
#[derive(Clone)]
pub struct Measure {
    runtime: Runtime,
}

callable!(Measure, "M");

impl Operation for Measure {
    type Input<'q> = &'q Qubit;
    type Output = Outcome;

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            runtime: runtime.clone(),
        })
    }

    fn body(&self, qubit: Self::Input<'_>) -> RuntimeResult<Outcome> {
        self.runtime.measure(qubit)
    }
}

/// Allocate a register of fresh qubits in `|0⟩`.
#[derive(Clone)]
pub struct Allocate {
    runtime: Runtime,
}

callable!(Allocate, "Allocate");

impl Operation for Allocate {
    type Input<'q> = usize;
    type Output = QubitRegister;

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            runtime: runtime.clone(),
        })
    }

    fn body(&self, count: Self::Input<'_>) -> RuntimeResult<QubitRegister> {
        self.runtime.allocate(count)
    }
}

/// Release a register issued by [`Allocate`].
#[derive(Clone)]
pub struct Release {
    runtime: Runtime,
}

callable!(Release, "Release");

impl Operation for Release {
    type Input<'q> = QubitRegister;
    type Output = ();

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            runtime: runtime.clone(),
        })
    }

    fn body(&self, register: Self::Input<'_>) -> RuntimeResult<()> {
        self.runtime.release(register)
    }
}

/// Return one qubit to `|0⟩`: measure, then flip on `One`.
#[derive(Clone)]
pub struct Reset {
    m: Measure,
    x: X,
}

callable!(Reset, "Reset");

impl Operation for Reset {
    type Input<'q> = &'q Qubit;
    type Output = ();

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            m: runtime.resolve()?,
            x: runtime.resolve()?,
        })
    }

    fn body(&self, qubit: Self::Input<'_>) -> RuntimeResult<()> {
        if self.m.apply(qubit)?.is_one() {
            self.x.apply(qubit)?;
        }
        Ok(())
    }
}

/// [`Reset`] every qubit of a register.
#[derive(Clone)]
pub struct ResetAll {
    reset: Reset,
}

callable!(ResetAll, "ResetAll");

impl Operation for ResetAll {
    type Input<'q> = &'q QubitRegister;
    type Output = ();

    fn init(runtime: &Runtime) -> RuntimeResult<Self> {
        Ok(Self {
            reset: runtime.resolve()?,
        })
    }

    fn body(&self, register: Self::Input<'_>) -> RuntimeResult<()> {
        register.iter().try_for_each(|qubit| self.reset.apply(qubit))
    }
}

/// Registry key of the primitive wrapping `gate`.
pub(crate) fn gate_primitive(gate: Gate) -> &'static str {
    match gate {
        Gate::H => H::FULL_NAME,
        Gate::X => X::FULL_NAME,
        Gate::Z => Z::FULL_NAME,
        Gate::Cnot => Cnot::FULL_NAME,
    }
}

/// Primitives every runtime provides regardless of its backend gate set.
pub(crate) const BUILTIN: [&str; 5] = [
    Allocate::FULL_NAME,
    Release::FULL_NAME,
    Measure::FULL_NAME,
    Reset::FULL_NAME,
    ResetAll::FULL_NAME,
];
