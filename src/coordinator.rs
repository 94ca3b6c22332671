//! The main loop (spec §4.E, §5 concurrency model, §8 end-to-end
//! scenarios). The coordinator is the sole owner of the process table,
//! the resource table, and the logical clock; workers only ever see a
//! read-only clock snapshot and their two channel endpoints.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::admission::AdmissionController;
use crate::clock::LogicalClock;
use crate::config::{RunConfig, REPORT_PERIOD_NANOS, TICK_JITTER_MAX_NANOS, TICK_JITTER_MIN_NANOS};
use crate::detector::DeadlockDetector;
use crate::dispatcher::Dispatcher;
use crate::message::{reply_channel, request_channel, RequestReceiver, RequestSender};
use crate::process_table::{ProcessTable, WorkerId};
use crate::reporter::{allocation_snapshot, summary, LineLog};
use crate::resource_table::ResourceTable;
use crate::rng::{RngSource, SystemRng};
use crate::stats::Stats;
use crate::worker::{spawn_worker, SharedClock, WorkerHandle};

/// What stopped the run, for `main`'s exit-code decision (spec §8
/// scenario 6: a wall-clock timeout is reported but is not itself an
/// error — it ends the run with a summary, same as reaching `N_total`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    AllWorkersDone,
    WallClockBudgetExceeded,
    SafetyAlarmTriggered,
    ShutdownRequested,
    LogCapExhausted,
}

pub struct RunOutcome {
    pub stats: Stats,
    pub stop_reason: StopReason,
}

pub struct Coordinator<W: Write> {
    config: RunConfig,
    clock: SharedClock,
    processes: ProcessTable,
    resources: ResourceTable,
    admission: AdmissionController,
    dispatcher: Dispatcher,
    detector: DeadlockDetector,
    stats: Stats,
    request_tx: RequestSender,
    request_rx: RequestReceiver,
    workers: HashMap<WorkerId, WorkerHandle>,
    log: LineLog<W>,
    rng: Box<dyn RngSource>,
    last_report: LogicalClock,
    shutdown: Arc<AtomicBool>,
}

impl<W: Write> Coordinator<W> {
    pub fn new(
        config: RunConfig,
        log: LineLog<W>,
        rng: Box<dyn RngSource>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let (request_tx, request_rx) = request_channel();
        let admission = AdmissionController::new(
            config.total_processes,
            config.concurrency_cap,
            config.launch_interval_ms,
        );
        Coordinator {
            clock: Arc::new(RwLock::new(LogicalClock::zero())),
            processes: ProcessTable::new(),
            resources: ResourceTable::new(
                crate::config::RESOURCES,
                crate::config::INSTANCES,
                crate::config::SLOTS,
            ),
            admission,
            dispatcher: Dispatcher::new(),
            detector: DeadlockDetector::new(),
            stats: Stats::default(),
            request_tx,
            request_rx,
            workers: HashMap::new(),
            log,
            rng,
            last_report: LogicalClock::zero(),
            shutdown,
            config,
        }
    }

    /// Run to completion, returning the accumulated stats and the reason
    /// the loop stopped.
    pub fn run(mut self) -> RunOutcome {
        let started = Instant::now();
        let verbose = self.config.verbose;
        let stop_reason;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                self.log.line("OSS: shutdown requested, stopping");
                stop_reason = StopReason::ShutdownRequested;
                break;
            }
            if self.log.cap_reached() {
                // The cap-reached marker line was already emitted by the
                // write that crossed it; nothing further to log (spec
                // §4.E: "Terminate when ... the log-line cap is
                // exhausted", mirroring `original_source/oss.c`'s
                // `linesWritten >= 10000` loop break).
                stop_reason = StopReason::LogCapExhausted;
                break;
            }
            if started.elapsed() >= self.config.safety_alarm {
                self.log.line("OSS: safety alarm triggered, forcing shutdown");
                stop_reason = StopReason::SafetyAlarmTriggered;
                break;
            }
            if started.elapsed() >= self.config.wall_clock_budget {
                self.log.line("OSS: wall-clock budget exceeded, ending run");
                stop_reason = StopReason::WallClockBudgetExceeded;
                break;
            }

            let jitter = self
                .rng
                .gen_range_u64(TICK_JITTER_MIN_NANOS, TICK_JITTER_MAX_NANOS);
            let now = {
                let mut c = self.clock.write();
                c.advance(0, jitter);
                *c
            };

            self.reap_finished_workers(now, verbose);

            if let Some(worker_id) = self.detector.run(
                now,
                &mut self.processes,
                &mut self.resources,
                &mut self.dispatcher,
                &mut self.stats,
                &mut self.log,
                verbose,
            ) {
                if let Some(handle) = self.workers.remove(&worker_id) {
                    handle.kill();
                    handle.join();
                }
            }

            if let Some((slot, worker_id, max_claim)) =
                self.admission
                    .try_admit(now, &mut self.processes, self.rng.as_mut())
            {
                self.spawn_worker(slot, worker_id, max_claim);
            }

            self.dispatcher.drain(
                &self.request_rx,
                &mut self.processes,
                &mut self.resources,
                &mut self.stats,
                &mut self.log,
                now,
                verbose,
            );

            if now.since(self.last_report) >= REPORT_PERIOD_NANOS as u128 {
                allocation_snapshot(&mut self.log, now, &self.resources, &self.processes);
                self.last_report = now;
            }

            if self.admission.done_launching() && self.processes.active_count() == 0 {
                stop_reason = StopReason::AllWorkersDone;
                break;
            }
        }

        let remaining: Vec<WorkerHandle> = self.workers.drain().map(|(_, h)| h).collect();
        for handle in &remaining {
            handle.kill();
        }
        for handle in remaining {
            handle.join();
        }

        summary(&mut self.log, &self.stats);
        RunOutcome {
            stats: self.stats,
            stop_reason,
        }
    }

    fn spawn_worker(
        &mut self,
        slot: crate::process_table::Slot,
        worker_id: WorkerId,
        max_claim: [u32; crate::config::RESOURCES],
    ) {
        let (reply_tx, reply_rx) = reply_channel();
        self.dispatcher.register(worker_id, reply_tx);
        let seed = self.rng.gen_range_u64(0, u64::MAX - 1);
        let worker_rng: Box<dyn RngSource> = Box::new(SystemRng::from_seed(seed));
        let handle = spawn_worker(
            worker_id,
            slot,
            max_claim,
            Arc::clone(&self.clock),
            self.request_tx.clone(),
            reply_rx,
            worker_rng,
        );
        self.workers.insert(worker_id, handle);
    }

    fn reap_finished_workers(&mut self, now: LogicalClock, verbose: bool) {
        let finished: Vec<WorkerId> = self
            .workers
            .iter()
            .filter(|(_, h)| h.is_finished())
            .map(|(id, _)| *id)
            .collect();

        for worker_id in finished {
            if let Some(handle) = self.workers.remove(&worker_id) {
                handle.join();
            }
            if let Some(slot) = self.processes.slot_of(worker_id) {
                self.dispatcher.unregister(worker_id);
                self.dispatcher.release_worker_holdings(
                    slot,
                    &mut self.processes,
                    &mut self.resources,
                    &mut self.stats,
                    &mut self.log,
                    now,
                    verbose,
                );
                self.processes.free(slot);
                self.stats.normal_terminations += 1;
                if verbose {
                    self.log
                        .line(&format!("OSS: [{now}] worker {worker_id} terminated normally"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LOG_LINE_CAP;
    use crate::rng::SystemRng;

    /// Scenario: once the log hits its 10,000-line cap the run stops
    /// immediately rather than continuing indefinitely (spec §4.E "Main
    /// Loop sequencing": terminate when "the wall-clock budget or
    /// log-line cap is exhausted", mirroring `original_source/oss.c`'s
    /// `linesWritten >= 10000` loop break).
    #[test]
    fn log_cap_exhaustion_stops_the_run() {
        let config = RunConfig::default();
        let log = LineLog::new(Vec::new());
        let rng: Box<dyn RngSource> = Box::new(SystemRng::from_seed(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut coordinator = Coordinator::new(config, log, rng, shutdown);

        for i in 0..=LOG_LINE_CAP {
            coordinator.log.line(&format!("line {i}"));
        }
        assert!(coordinator.log.cap_reached());

        let outcome = coordinator.run();
        assert_eq!(outcome.stop_reason, StopReason::LogCapExhausted);
    }
}
