//! Fixed-capacity process table (spec §3, §4.B).
//!
//! One slot per live worker. No growth: when the table is full, Admission
//! simply does not spawn (spec §8 boundary behavior).

use crate::clock::LogicalClock;
use crate::config::{RESOURCES, SLOTS};

pub type Slot = usize;
pub type WorkerId = u64;

/// Process control block: per-worker slot state.
#[derive(Debug, Clone)]
pub struct Pcb {
    pub occupied: bool,
    pub worker_id: WorkerId,
    pub start_time: LogicalClock,
    pub blocked: bool,
    pub holdings: [u32; RESOURCES],
    pub max_claim: [u32; RESOURCES],
}

impl Pcb {
    const fn empty() -> Self {
        Pcb {
            occupied: false,
            worker_id: 0,
            start_time: LogicalClock::zero(),
            blocked: false,
            holdings: [0; RESOURCES],
            max_claim: [0; RESOURCES],
        }
    }
}

pub struct ProcessTable {
    slots: [Pcb; SLOTS],
}

impl ProcessTable {
    pub fn new() -> Self {
        ProcessTable {
            slots: std::array::from_fn(|_| Pcb::empty()),
        }
    }

    pub fn get(&self, slot: Slot) -> &Pcb {
        &self.slots[slot]
    }

    pub fn get_mut(&mut self, slot: Slot) -> &mut Pcb {
        &mut self.slots[slot]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, &Pcb)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, p)| p.occupied)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|p| p.occupied).count()
    }

    /// First unoccupied slot, if any (linear scan per spec §4.B).
    pub fn find_free_slot(&self) -> Option<Slot> {
        self.slots.iter().position(|p| !p.occupied)
    }

    /// Slot holding `worker_id`, if still live (linear scan per spec §4.B).
    pub fn slot_of(&self, worker_id: WorkerId) -> Option<Slot> {
        self.slots
            .iter()
            .position(|p| p.occupied && p.worker_id == worker_id)
    }

    /// Occupy a free slot for a newly admitted worker.
    pub fn admit(
        &mut self,
        slot: Slot,
        worker_id: WorkerId,
        start_time: LogicalClock,
        max_claim: [u32; RESOURCES],
    ) {
        let pcb = &mut self.slots[slot];
        debug_assert!(!pcb.occupied);
        pcb.occupied = true;
        pcb.worker_id = worker_id;
        pcb.start_time = start_time;
        pcb.blocked = false;
        pcb.holdings = [0; RESOURCES];
        pcb.max_claim = max_claim;
    }

    /// Free a slot, whether by normal reap or forced deadlock termination.
    pub fn free(&mut self, slot: Slot) {
        self.slots[slot] = Pcb::empty();
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
