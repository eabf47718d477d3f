//! Runtime configuration.
//!
//! ```json
//! { "max_qubits": 8, "seed": 42, "warn_on_leak": true }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use serde::{Deserialize, Serialize};

use crate::capability::Capabilities;
use crate::error::{RuntimeError, RuntimeResult};

/// Settings applied when a runtime is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Cap on simultaneously live qubits. `None` defers to the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_qubits: Option<usize>,
    /// Seed for the built-in simulator. `None` seeds from the OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Emit a warning when a run returns while qubits it allocated are live.
    ///
    /// The check compares the runtime-wide live count before and after the
    /// run, so concurrent runs on clones of one runtime can mask a leak or
    /// report one that belongs to another run.
    pub warn_on_leak: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_qubits: None,
            seed: None,
            warn_on_leak: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> RuntimeResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| RuntimeError::Configuration(format!("invalid runtime config: {e}")))
    }

    /// Cap live qubits.
    pub fn with_max_qubits(mut self, max_qubits: usize) -> Self {
        self.max_qubits = Some(max_qubits);
        self
    }

    /// Fix the simulator seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check the configuration against a backend and return the effective
    /// live-qubit limit.
    pub fn effective_max_qubits(&self, capabilities: &Capabilities) -> RuntimeResult<usize> {
        match self.max_qubits {
            Some(max) if max > capabilities.max_qubits => Err(RuntimeError::Configuration(format!(
                "max_qubits {max} exceeds backend '{}' capacity of {}",
                capabilities.name, capabilities.max_qubits
            ))),
            Some(max) => Ok(max),
            None => Ok(capabilities.max_qubits),
        }
    }
}
