//! Run reports.
//!
//! [`RunStats`] counts the effects a runtime has issued; a [`RunReport`]
//! pairs a run's output with the stats delta it caused and its timing.
//! Counters are runtime-wide, so a report taken while other runs execute
//! concurrently on the same runtime includes their effects too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cumulative effect counters of one runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Qubits allocated.
    pub allocated: u64,
    /// Qubits released.
    pub released: u64,
    /// Gates applied.
    pub gates: u64,
    /// Measurements taken.
    pub measurements: u64,
}

impl RunStats {
    /// Counters accumulated since `earlier`.
    pub fn since(&self, earlier: &RunStats) -> RunStats {
        RunStats {
            allocated: self.allocated.saturating_sub(earlier.allocated),
            released: self.released.saturating_sub(earlier.released),
            gates: self.gates.saturating_sub(earlier.gates),
            measurements: self.measurements.saturating_sub(earlier.measurements),
        }
    }

    /// Total number of effects.
    pub fn total(&self) -> u64 {
        self.allocated + self.released + self.gates + self.measurements
    }
}

/// Output of one top-level run together with how it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport<T> {
    /// Full name of the operation that ran.
    pub operation: String,
    /// The operation's output.
    pub output: T,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Execution time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    /// Effects issued during the run.
    pub stats: RunStats,
    /// Additional metadata.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl<T> RunReport<T> {
    /// Create a new report.
    pub fn new(operation: impl Into<String>, output: T, started_at: DateTime<Utc>) -> Self {
        Self {
            operation: operation.into(),
            output,
            started_at,
            execution_time_ms: None,
            stats: RunStats::default(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the execution time.
    pub fn with_execution_time(mut self, time_ms: u64) -> Self {
        self.execution_time_ms = Some(time_ms);
        self
    }

    /// Set the effect counters.
    pub fn with_stats(mut self, stats: RunStats) -> Self {
        self.stats = stats;
        self
    }

    /// Set metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Transform the output, keeping the rest of the report.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RunReport<U> {
        RunReport {
            operation: self.operation,
            output: f(self.output),
            started_at: self.started_at,
            execution_time_ms: self.execution_time_ms,
            stats: self.stats,
            metadata: self.metadata,
        }
    }
}
