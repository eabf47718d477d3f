//! Generation-indexed bookkeeping of live qubit handles.
//!
//! Every slot the backend hands out gets a generation counter. Issuing a
//! handle marks the slot live at its current generation; retiring it marks
//! the slot dead and bumps the generation, so a handle kept past release no
//! longer matches and is rejected.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{RuntimeError, RuntimeResult};
use crate::qubit::{HandleKey, QubitId};

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    generation: u32,
    live: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Arena {
    slots: FxHashMap<QubitId, Slot>,
    live: usize,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of live handles.
    pub(crate) fn live_count(&self) -> usize {
        self.live
    }

    /// Mark freshly allocated backend slots live and return their keys.
    ///
    /// Fails without touching the arena if the backend handed out a slot
    /// that is still live, or the same slot twice.
    pub(crate) fn issue(&mut self, ids: &[QubitId]) -> RuntimeResult<Vec<HandleKey>> {
        let mut seen = FxHashSet::default();
        for id in ids {
            if !seen.insert(*id) || self.slots.get(id).is_some_and(|slot| slot.live) {
                return Err(RuntimeError::Backend(format!(
                    "backend issued slot {id} while it is still live"
                )));
            }
        }

        let keys = ids
            .iter()
            .map(|&id| {
                let slot = self.slots.entry(id).or_default();
                slot.live = true;
                HandleKey {
                    id,
                    generation: slot.generation,
                }
            })
            .collect();
        self.live += ids.len();
        Ok(keys)
    }

    /// Check that `key` names a live handle of the current generation.
    pub(crate) fn check(&self, key: HandleKey) -> RuntimeResult<()> {
        match self.slots.get(&key.id) {
            Some(slot) if slot.live && slot.generation == key.generation => Ok(()),
            Some(slot) if key.generation < slot.generation => Err(RuntimeError::InvalidHandle(
                format!("{key} was already released"),
            )),
            _ => Err(RuntimeError::InvalidHandle(format!(
                "{key} was never allocated"
            ))),
        }
    }

    /// Check a group of handles for release: every key must be live and
    /// appear only once.
    pub(crate) fn check_release(&self, keys: &[HandleKey]) -> RuntimeResult<()> {
        let mut seen = FxHashSet::default();
        for key in keys {
            self.check(*key)?;
            if !seen.insert(key.id) {
                return Err(RuntimeError::InvalidHandle(format!(
                    "{key} appears twice in one release"
                )));
            }
        }
        Ok(())
    }

    /// Retire a group of handles.
    ///
    /// Validation is all-or-nothing: if any key is stale, unknown, or listed
    /// twice, no slot changes state.
    pub(crate) fn retire(&mut self, keys: &[HandleKey]) -> RuntimeResult<()> {
        self.check_release(keys)?;

        for key in keys {
            if let Some(slot) = self.slots.get_mut(&key.id) {
                slot.live = false;
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.live -= keys.len();
        Ok(())
    }
}
