//! Classical measurement outcomes.

use serde::{Deserialize, Serialize};

/// The classical result of measuring one qubit in the computational basis.
///
/// Only `measure` produces an `Outcome`; composites compare outcomes by
/// value to drive classical control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// The qubit was found in `|0⟩`.
    Zero,
    /// The qubit was found in `|1⟩`.
    One,
}

impl Outcome {
    /// Check if this outcome is `One`.
    pub fn is_one(self) -> bool {
        matches!(self, Outcome::One)
    }
}

impl From<bool> for Outcome {
    fn from(bit: bool) -> Self {
        if bit { Outcome::One } else { Outcome::Zero }
    }
}

impl From<Outcome> for bool {
    fn from(outcome: Outcome) -> Self {
        outcome.is_one()
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Outcome::Zero => "Zero",
            Outcome::One => "One",
        })
    }
}
