//! Runtime error types.
//!
//! Errors are categorized by who has to act on them:
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | **Configuration** | `UnresolvedDependency`, `Configuration` | Fix runtime setup |
//! | **Resource** | `ResourceExhausted` | Release qubits or request fewer |
//! | **Fatal** | `InvalidHandle`, `Backend` | None, the current run is aborted |
//! | **Host** | `Aborted` | Inspect the host task |
//!
//! There are no automatic retries at this layer. Retry policy, if any,
//! belongs to the host program.

use thiserror::Error;

/// Errors that can occur while resolving or running operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    // ── Configuration errors (fix runtime setup) ─────────────────────
    /// A dependency was requested that the runtime was not configured with.
    #[error("Unresolved dependency: {0}")]
    UnresolvedDependency(String),

    /// Invalid runtime configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ── Resource errors (recoverable) ────────────────────────────────
    /// The backend cannot supply the requested number of live qubits.
    #[error("Resource exhausted: requested {requested} qubits, {available} available")]
    ResourceExhausted {
        /// Qubits requested by the failing `allocate` call.
        requested: usize,
        /// Qubits that could still be allocated at the time of the call.
        available: usize,
    },

    // ── Fatal errors (abort the current run) ─────────────────────────
    /// Ownership violation: a released, foreign or aliased qubit handle was used.
    #[error("Invalid qubit handle: {0}")]
    InvalidHandle(String),

    /// Backend-specific failure.
    #[error("Backend error: {0}")]
    Backend(String),

    // ── Host errors ──────────────────────────────────────────────────
    /// A run task did not complete (panicked or was torn down by the host).
    #[error("Run aborted: {0}")]
    Aborted(String),
}

impl RuntimeError {
    /// Returns `true` if this error means the quantum-state bookkeeping can
    /// no longer be trusted for the current run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidHandle(_) | Self::Backend(_))
    }

    /// Returns `true` if the caller may retry after freeing resources.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
