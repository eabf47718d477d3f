//! Qubit handles and registers.
//!
//! # Ownership
//!
//! A [`Qubit`] is a move-only token: it is neither `Copy` nor `Clone`, so the
//! type system already rules out duplication. Nested operations borrow it
//! (`&Qubit`) for the duration of a call. A [`QubitRegister`] owns the
//! handles issued by one `allocate` call and is consumed by `release`.
//!
//! The runtime additionally checks every handle dynamically against a
//! generation-indexed arena, so a stale or foreign handle is detected as
//! `InvalidHandle` instead of silently addressing another qubit:
//!
//! ```text
//!   allocate() ──→ live(slot, gen) ──→ release() ──→ dead(slot, gen + 1)
//! ```

use std::ops::Index;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Backend-facing slot index of one simulated qubit.
///
/// Backends may reuse a `QubitId` after it has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QubitId(pub u32);

impl std::fmt::Display for QubitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// A backend slot paired with the generation it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleKey {
    /// Backend slot.
    pub id: QubitId,
    /// Allocation generation of the slot.
    pub generation: u32,
}

impl std::fmt::Display for HandleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.id, self.generation)
    }
}

/// Identity of one runtime instance. Handles are only valid on the runtime
/// that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeId(pub u64);

impl RuntimeId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rt-{}", self.0)
    }
}

/// Opaque, non-copyable token for one live qubit.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Qubit {
    key: HandleKey,
    owner: RuntimeId,
}

impl Qubit {
    pub(crate) fn new(key: HandleKey, owner: RuntimeId) -> Self {
        Self { key, owner }
    }

    /// The arena key of this handle.
    pub fn key(&self) -> HandleKey {
        self.key
    }

    /// The backend slot this handle addresses.
    pub fn id(&self) -> QubitId {
        self.key.id
    }

    /// The runtime that issued this handle.
    pub fn owner(&self) -> RuntimeId {
        self.owner
    }

    /// Forge a second handle with the same identity. Only tests need this,
    /// to exercise the runtime's stale-handle detection.
    #[cfg(test)]
    pub(crate) fn alias(&self) -> Qubit {
        Qubit {
            key: self.key,
            owner: self.owner,
        }
    }
}

impl std::fmt::Display for Qubit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.key, self.owner)
    }
}

/// The ordered group of handles issued by a single `allocate` call.
///
/// Must be handed back to `release` as a whole once no handle in it is in use.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct QubitRegister {
    qubits: Vec<Qubit>,
}

impl QubitRegister {
    pub(crate) fn new(qubits: Vec<Qubit>) -> Self {
        Self { qubits }
    }

    /// Number of handles in the register.
    pub fn len(&self) -> usize {
        self.qubits.len()
    }

    /// Check if the register is empty.
    pub fn is_empty(&self) -> bool {
        self.qubits.is_empty()
    }

    /// Borrow the handle at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Qubit> {
        self.qubits.get(index)
    }

    /// Iterate over the handles in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &Qubit> {
        self.qubits.iter()
    }

    /// Arena keys of every handle, in allocation order.
    pub fn keys(&self) -> Vec<HandleKey> {
        self.qubits.iter().map(Qubit::key).collect()
    }

    pub(crate) fn into_inner(self) -> Vec<Qubit> {
        self.qubits
    }
}

impl Index<usize> for QubitRegister {
    type Output = Qubit;

    fn index(&self, index: usize) -> &Qubit {
        &self.qubits[index]
    }
}

impl<'a> IntoIterator for &'a QubitRegister {
    type Item = &'a Qubit;
    type IntoIter = std::slice::Iter<'a, Qubit>;

    fn into_iter(self) -> Self::IntoIter {
        self.qubits.iter()
    }
}
