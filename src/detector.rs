//! Deadlock detector: periodic single-resource feasibility scan, victim
//! selection, and forced release (spec §4.G).
//!
//! This is deliberately not a full cycle-detection algorithm: it flags a
//! blocked process only when *no* resource class could unblock it with a
//! single grant from the current `available` vector. Under the worker
//! policy modeled here (one resource requested at a time), that coincides
//! with a true circular wait, per the spec's own note.

use std::io::Write;

use crate::clock::LogicalClock;
use crate::dispatcher::Dispatcher;
use crate::process_table::{ProcessTable, Slot};
use crate::reporter::LineLog;
use crate::resource_table::ResourceTable;
use crate::stats::Stats;

pub struct DeadlockDetector {
    last_detected_second: Option<u64>,
}

impl DeadlockDetector {
    pub fn new() -> Self {
        DeadlockDetector {
            last_detected_second: None,
        }
    }

    /// Whether a new simulated second has elapsed since the last run —
    /// the detector fires "at most once per whole simulated second".
    pub fn due(&self, now: LogicalClock) -> bool {
        self.last_detected_second != Some(now.seconds)
    }

    /// Run one detection pass if due. Returns the worker id terminated as
    /// a victim, if any.
    #[allow(clippy::too_many_arguments)]
    pub fn run<W: Write>(
        &mut self,
        now: LogicalClock,
        processes: &mut ProcessTable,
        resources: &mut ResourceTable,
        dispatcher: &mut Dispatcher,
        stats: &mut Stats,
        log: &mut LineLog<W>,
        verbose: bool,
    ) -> Option<u64> {
        if !self.due(now) {
            return None;
        }
        self.last_detected_second = Some(now.seconds);
        stats.deadlock_detected_run += 1;

        let victim = self.find_victim(processes, resources);

        if let Some(slot) = victim {
            let worker_id = processes.get(slot).worker_id;
            stats.deadlock_processes += 1;
            stats.deadlock_terminations += 1;

            log.line(&format!(
                "OSS: [{now}] deadlock detected: worker {worker_id} (slot {slot}) selected as victim"
            ));
            if verbose {
                log.line(&format!(
                    "OSS: [{now}] worker {worker_id} holdings before release = {:?}",
                    processes.get(slot).holdings
                ));
            }

            dispatcher.unregister(worker_id);
            dispatcher.release_worker_holdings(slot, processes, resources, stats, log, now, verbose);
            processes.free(slot);

            log.line(&format!(
                "OSS: [{now}] worker {worker_id} terminated (deadlock victim)"
            ));

            Some(worker_id)
        } else {
            None
        }
    }

    /// The first blocked process with no single-resource path to
    /// unblocking, if any.
    fn find_victim(&self, processes: &ProcessTable, resources: &ResourceTable) -> Option<Slot> {
        for (slot, pcb) in processes.iter() {
            if !pcb.blocked {
                continue;
            }
            let can_proceed = (0..resources.resources.len()).any(|r| {
                let need = pcb.max_claim[r].saturating_sub(pcb.holdings[r]);
                need > 0 && resources.available(r) >= need
            });
            if !can_proceed {
                return Some(slot);
            }
        }
        None
    }
}

impl Default for DeadlockDetector {
    fn default() -> Self {
        Self::new()
    }
}
