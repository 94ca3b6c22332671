//! Request dispatcher: grants, blocks, and re-allocates on release (spec
//! §4.F). The hardest single component — it is the only place that
//! mutates both tables and must keep every invariant in §8 intact across
//! the boundary of a single message.

use std::collections::HashMap;
use std::io::Write;

use crate::clock::LogicalClock;
use crate::config::SNAPSHOT_GRANT_PERIOD;
use crate::message::{Grant, Message, ReplySender};
use crate::process_table::{ProcessTable, Slot, WorkerId};
use crate::reporter::{grant_count_snapshot, LineLog};
use crate::resource_table::ResourceTable;
use crate::stats::Stats;

pub struct Dispatcher {
    reply_senders: HashMap<WorkerId, ReplySender>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            reply_senders: HashMap::new(),
        }
    }

    pub fn register(&mut self, worker_id: WorkerId, reply_tx: ReplySender) {
        self.reply_senders.insert(worker_id, reply_tx);
    }

    pub fn unregister(&mut self, worker_id: WorkerId) {
        self.reply_senders.remove(&worker_id);
    }

    fn reply(&self, worker_id: WorkerId, grant: Grant) {
        // A reply target may already be gone (worker reaped between the
        // message being enqueued and processed); dropping the reply is
        // correct-by-design, mirroring the stale-slot discard policy.
        if let Some(tx) = self.reply_senders.get(&worker_id) {
            let _ = tx.send(grant);
        }
    }

    /// Drain every message currently queued, applying the request/release
    /// protocol to `processes`/`resources` and updating `stats`.
    pub fn drain<W: Write>(
        &mut self,
        incoming: &crossbeam_channel::Receiver<Message>,
        processes: &mut ProcessTable,
        resources: &mut ResourceTable,
        stats: &mut Stats,
        log: &mut LineLog<W>,
        now: LogicalClock,
        verbose: bool,
    ) {
        for message in incoming.try_iter() {
            match message {
                Message::Request {
                    worker_id,
                    resource,
                    quantity,
                } => self.handle_request(
                    worker_id, resource, quantity, processes, resources, stats, log, now, verbose,
                ),
                Message::Release {
                    worker_id,
                    resource,
                } => self.handle_release(
                    worker_id, resource, processes, resources, stats, log, now, verbose,
                ),
            }
        }
    }

    fn handle_request<W: Write>(
        &mut self,
        worker_id: WorkerId,
        resource: usize,
        quantity: u32,
        processes: &mut ProcessTable,
        resources: &mut ResourceTable,
        stats: &mut Stats,
        log: &mut LineLog<W>,
        now: LogicalClock,
        verbose: bool,
    ) {
        let Some(slot) = processes.slot_of(worker_id) else {
            return; // stale-slot message: correct-by-design discard (spec §7)
        };

        stats.total_requests += 1;
        if verbose {
            log.line(&format!(
                "OSS: [{now}] worker {worker_id} requesting R{resource} x{quantity}"
            ));
        }

        // Invariant P2 (spec §8): holdings <= maxClaim. An instant grant
        // must never exceed the requester's own headroom, regardless of
        // `available`.
        let pcb = processes.get(slot);
        let headroom = pcb.max_claim[resource].saturating_sub(pcb.holdings[resource]);

        if quantity <= headroom && resources.try_allocate(slot, resource, quantity) {
            processes.get_mut(slot).holdings[resource] += quantity;
            stats.granted_instantly += 1;
            self.reply(
                worker_id,
                Grant {
                    resource,
                    quantity,
                },
            );
            if verbose {
                log.line(&format!(
                    "OSS: [{now}] worker {worker_id} granted R{resource} x{quantity} instantly"
                ));
            }

            stats.grants_since_snapshot += 1;
            if stats.grants_since_snapshot >= SNAPSHOT_GRANT_PERIOD {
                grant_count_snapshot(log, now, resources);
                stats.grants_since_snapshot = 0;
            }
        } else {
            resources.enqueue_waiter(slot, resource);
            processes.get_mut(slot).blocked = true;
            if verbose {
                log.line(&format!(
                    "OSS: [{now}] worker {worker_id} blocked on R{resource}"
                ));
            }
        }
    }

    fn handle_release<W: Write>(
        &mut self,
        worker_id: WorkerId,
        resource: usize,
        processes: &mut ProcessTable,
        resources: &mut ResourceTable,
        stats: &mut Stats,
        log: &mut LineLog<W>,
        now: LogicalClock,
        verbose: bool,
    ) {
        let Some(slot) = processes.slot_of(worker_id) else {
            return;
        };

        let released = resources.release_all(slot, resource);
        if released > 0 {
            processes.get_mut(slot).holdings[resource] = 0;
            if verbose {
                log.line(&format!(
                    "OSS: [{now}] worker {worker_id} released R{resource} x{released}"
                ));
            }
        }

        self.reallocate(resource, processes, resources, stats, log, now, verbose);
    }

    /// The re-allocation pass (spec §4.F step 3): scan the resource's wait
    /// queue FIFO, granting `maxClaim - holdings` to any waiter that
    /// `available` can now satisfy, skipping over ones it still can't
    /// without stopping the scan.
    fn reallocate<W: Write>(
        &mut self,
        resource: usize,
        processes: &mut ProcessTable,
        resources: &mut ResourceTable,
        stats: &mut Stats,
        log: &mut LineLog<W>,
        now: LogicalClock,
        verbose: bool,
    ) {
        let mut grants: Vec<(Slot, u32)> = Vec::new();
        {
            let queue = &mut resources.resources[resource].wait_queue;
            let available = &mut resources.resources[resource].available;
            let held_by = &mut resources.resources[resource].held_by;
            queue.reallocate(|slot| {
                let pcb = processes.get(slot);
                let need = pcb.max_claim[resource].saturating_sub(pcb.holdings[resource]);
                if need > 0 && *available >= need {
                    *available -= need;
                    held_by[slot] += need;
                    grants.push((slot, need));
                    true
                } else {
                    false
                }
            });
        }

        for (slot, need) in grants {
            let worker_id = {
                let pcb = processes.get_mut(slot);
                pcb.holdings[resource] += need;
                pcb.blocked = false;
                pcb.worker_id
            };
            stats.granted_after_wait += 1;
            self.reply(
                worker_id,
                Grant {
                    resource,
                    quantity: need,
                },
            );
            if verbose {
                log.line(&format!(
                    "OSS: [{now}] worker {worker_id} unblocked: granted R{resource} x{need}"
                ));
            }
        }
    }

    /// Release everything a worker held and run a re-allocation pass for
    /// each resource it released — used by both normal reap and deadlock
    /// victim resolution (spec §4.G: "implementers SHOULD also trigger a
    /// re-allocation pass for each resource the victim released").
    pub fn release_worker_holdings<W: Write>(
        &mut self,
        slot: Slot,
        processes: &mut ProcessTable,
        resources: &mut ResourceTable,
        stats: &mut Stats,
        log: &mut LineLog<W>,
        now: LogicalClock,
        verbose: bool,
    ) {
        let resource_count = resources.resources.len();
        let released = resources.release_all_resources(slot);
        for r in 0..resource_count {
            if released[r] > 0 {
                self.reallocate(r, processes, resources, stats, log, now, verbose);
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
