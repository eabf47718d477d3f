//! Sample protocols built on the primitive set.
//!
//! - [`bell`]: measurement-feedback state preparation and a Bell-pair
//!   correlation test.
//! - [`teleportation`]: single-qubit teleportation and a classical-message
//!   round trip through it.

pub mod bell;
pub mod teleportation;

use crate::runtime::RuntimeBuilder;

/// Register every sample operation.
pub fn register_all(builder: RuntimeBuilder) -> RuntimeBuilder {
    teleportation::register(bell::register(builder))
}
