//! Callback-slot table: matches out-of-order responses to in-flight requests.
//!
//! The table is a slab that only ever grows. Each in-flight request occupies
//! exactly one slot holding its one-shot awaiter; resolved slot indices go
//! onto a LIFO free list and are reused by later requests. Slot 0 belongs to
//! the handshake and is never recycled.

use kestrel_runtime::Value;
use tokio::sync::oneshot;

use crate::errors::Error;

/// Slot reserved for the connection-configuration handshake.
pub(crate) const HANDSHAKE_SLOT: u32 = 0;

/// One-shot completion for an in-flight request.
pub(crate) type Awaiter = oneshot::Sender<Result<Value, Error>>;

pub(crate) struct SlotTable {
    /// Index = callback slot id. `None` marks a slot with no live awaiter
    /// (recycled, or taken but not yet installed).
    slots: Vec<Option<Awaiter>>,
    /// Recycled slot ids, reused LIFO.
    free: Vec<u32>,
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Claim a slot id: top of the free list if non-empty, otherwise the
    /// current size of the table.
    pub(crate) fn alloc_slot(&mut self) -> u32 {
        match self.free.pop() {
            Some(id) => id,
            None => {
                let id = self.slots.len() as u32;
                self.slots.push(None);
                id
            }
        }
    }

    /// Register the awaiter for a slot claimed by [`Self::alloc_slot`].
    pub(crate) fn install(&mut self, id: u32, awaiter: Awaiter) {
        let slot = &mut self.slots[id as usize];
        debug_assert!(slot.is_none(), "two live awaiters on slot {id}");
        *slot = Some(awaiter);
    }

    /// Claim a slot and register its awaiter in one step.
    pub(crate) fn register(&mut self, awaiter: Awaiter) -> u32 {
        let id = self.alloc_slot();
        self.install(id, awaiter);
        id
    }

    /// Pop the awaiter for a resolved slot, if it is live.
    pub(crate) fn take(&mut self, id: u32) -> Option<Awaiter> {
        self.slots.get_mut(id as usize).and_then(Option::take)
    }

    /// Return a resolved slot id to the free list. The handshake slot stays
    /// reserved.
    pub(crate) fn recycle(&mut self, id: u32) {
        if id != HANDSHAKE_SLOT {
            self.free.push(id);
        }
    }

    /// Pop every live awaiter, for session close.
    pub(crate) fn take_all(&mut self) -> Vec<Awaiter> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.len()
    }
}
