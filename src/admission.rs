//! Time-gated admission of new workers up to a concurrency cap (spec
//! §4.E).

use crate::clock::LogicalClock;
use crate::config::{INSTANCES, RESOURCES};
use crate::process_table::{ProcessTable, WorkerId};
use crate::rng::RngSource;

pub struct AdmissionController {
    pub launched: u32,
    pub total: u32,
    pub concurrency_cap: usize,
    pub launch_interval_nanos: u64,
    next_launch_time: LogicalClock,
    next_worker_id: WorkerId,
}

impl AdmissionController {
    pub fn new(total: u32, concurrency_cap: usize, launch_interval_ms: u64) -> Self {
        AdmissionController {
            launched: 0,
            total,
            concurrency_cap,
            launch_interval_nanos: launch_interval_ms * 1_000_000,
            next_launch_time: LogicalClock::zero(),
            next_worker_id: 1,
        }
    }

    pub fn done_launching(&self) -> bool {
        self.launched >= self.total
    }

    /// If every admission condition holds, occupy a process-table slot
    /// and return the new worker's (slot, id, maxClaim). Returns `None`
    /// otherwise — never an error; a full table or a not-yet-elapsed
    /// interval are ordinary "not yet" outcomes (spec §8 boundary
    /// behavior).
    pub fn try_admit(
        &mut self,
        now: LogicalClock,
        processes: &mut ProcessTable,
        rng: &mut dyn RngSource,
    ) -> Option<(usize, WorkerId, [u32; RESOURCES])> {
        if self.done_launching() {
            return None;
        }
        if processes.active_count() >= self.concurrency_cap {
            return None;
        }
        if now < self.next_launch_time {
            return None;
        }
        let slot = processes.find_free_slot()?;

        let worker_id = self.next_worker_id;
        self.next_worker_id += 1;

        let mut max_claim = [0u32; RESOURCES];
        for claim in max_claim.iter_mut() {
            *claim = rng.gen_range_u32(0, INSTANCES);
        }

        processes.admit(slot, worker_id, now, max_claim);
        self.launched += 1;
        self.next_launch_time = {
            let mut t = now;
            t.advance(0, self.launch_interval_nanos);
            t
        };

        Some((slot, worker_id, max_claim))
    }
}
