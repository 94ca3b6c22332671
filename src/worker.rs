//! Worker task behavior (spec §1 "out of scope: worker's randomized
//! request-generation policy", but a runnable crate still has to embody
//! some concrete policy). The concrete constants are lifted from
//! `original_source/user.c`: decide whether to request or release once
//! every simulated 0.5s, and roll a 1% termination chance once per
//! simulated second after at least 1 simulated second of life.
//!
//! Per the redesign note in spec §9, a worker here is an OS thread rather
//! than a forked+exec'd process: it touches only the shared logical
//! clock (read-only) and its two channel endpoints, never the process or
//! resource tables directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::RwLock;

use crate::clock::LogicalClock;
use crate::config::RESOURCES;
use crate::message::{Message, RequestSender};
use crate::process_table::{Slot, WorkerId};
use crate::rng::RngSource;

const ACTION_BOUND_NANOS: u64 = 500_000_000;
const MIN_LIFETIME_NANOS: u64 = 1_000_000_000;
const REQUEST_PROBABILITY_PCT: u8 = 80;
const TERMINATION_PROBABILITY_PCT: u8 = 1;

pub type SharedClock = Arc<RwLock<LogicalClock>>;

/// One simulated-tick decision a worker can make. Separated from the
/// thread/channel plumbing below so the policy itself is plain,
/// deterministically testable logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    RequestOneUnit { resource: usize },
    ReleaseHeld { resource: usize },
    Idle,
    Terminate,
}

/// Decide the next action given the worker's locally-tracked holdings,
/// its own `max_claim` cap, how long it has lived, and how long since
/// its last action — mirrors `user.c`'s decision tree, never requesting
/// past `max_claim` (invariant P2, spec §8).
pub fn decide_action(
    rng: &mut dyn RngSource,
    held: &[u32; RESOURCES],
    max_claim: &[u32; RESOURCES],
    lifetime_nanos: u128,
    since_last_action_nanos: u128,
) -> Action {
    if lifetime_nanos >= MIN_LIFETIME_NANOS as u128 {
        let roll = rng.gen_percent();
        if roll < TERMINATION_PROBABILITY_PCT {
            return Action::Terminate;
        }
    }

    if since_last_action_nanos < ACTION_BOUND_NANOS as u128 {
        return Action::Idle;
    }

    let resource = rng.gen_range_u32(0, RESOURCES as u32 - 1) as usize;
    let roll = rng.gen_percent();
    if roll < REQUEST_PROBABILITY_PCT {
        if held[resource] < max_claim[resource] {
            Action::RequestOneUnit { resource }
        } else {
            Action::Idle
        }
    } else if held[resource] > 0 {
        Action::ReleaseHeld { resource }
    } else {
        Action::Idle
    }
}

/// Handle to a live worker thread, owned by the coordinator.
pub struct WorkerHandle {
    pub worker_id: WorkerId,
    pub slot: Slot,
    kill: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Cooperative termination: set the flag the worker checks between
    /// actions (spec §9: "install a handler that sets a flag"). Used both
    /// for deadlock-victim resolution and for shutdown.
    pub fn kill(&self) {
        self.kill.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map(|j| j.is_finished()).unwrap_or(true)
    }

    pub fn join(mut self) {
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Spawn a worker thread. `rng` is owned by the thread so each worker's
/// decision stream is independent; callers needing determinism (tests)
/// construct it from a fixed, worker-id-derived seed.
pub fn spawn_worker(
    worker_id: WorkerId,
    slot: Slot,
    max_claim: [u32; RESOURCES],
    clock: SharedClock,
    request_tx: RequestSender,
    reply_rx: crate::message::ReplyReceiver,
    mut rng: Box<dyn RngSource>,
) -> WorkerHandle {
    let kill = Arc::new(AtomicBool::new(false));
    let kill_for_thread = Arc::clone(&kill);

    let join = std::thread::spawn(move || {
        let mut held = [0u32; RESOURCES];
        let start = *clock.read();
        let mut last_action = start;

        loop {
            if kill_for_thread.load(Ordering::SeqCst) {
                return;
            }
            let now = *clock.read();
            let action = decide_action(
                rng.as_mut(),
                &held,
                &max_claim,
                now.since(start),
                now.since(last_action),
            );

            match action {
                Action::Idle => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Action::Terminate => {
                    for (resource, &units) in held.iter().enumerate() {
                        if units > 0 {
                            let _ = request_tx.send(Message::Release {
                                worker_id,
                                resource,
                            });
                        }
                    }
                    return;
                }
                Action::RequestOneUnit { resource } => {
                    last_action = now;
                    if request_tx
                        .send(Message::Request {
                            worker_id,
                            resource,
                            quantity: 1,
                        })
                        .is_err()
                    {
                        return;
                    }
                    // Block on the reply, but re-check the kill flag
                    // periodically: a deadlock victim's request may
                    // never be answered once the detector has already
                    // released its holdings and forgotten its slot.
                    loop {
                        if kill_for_thread.load(Ordering::SeqCst) {
                            return;
                        }
                        match reply_rx.recv_timeout(Duration::from_millis(5)) {
                            Ok(grant) => {
                                held[grant.resource] += grant.quantity;
                                break;
                            }
                            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
                        }
                    }
                }
                Action::ReleaseHeld { resource } => {
                    last_action = now;
                    held[resource] = 0;
                    if request_tx
                        .send(Message::Release {
                            worker_id,
                            resource,
                        })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }
    });

    WorkerHandle {
        worker_id,
        slot,
        kill,
        join: Some(join),
    }
}
