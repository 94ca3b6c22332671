//! Cross-module scenarios. These drive the library directly — admission,
//! dispatch, detection, and reporting wired together by hand, the way
//! the coordinator wires them — rather than spawning the `oss` binary as
//! a subprocess. Timing-sensitive behavior that depends on real worker
//! threads (the randomized request/release/terminate policy) is left to
//! the coordinator's own wall-clock-bound stop condition, which is the
//! one piece of that path that is deterministic regardless of how the
//! threads schedule.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use ossim::admission::AdmissionController;
use ossim::clock::LogicalClock;
use ossim::cli::Cli;
use ossim::config::{RunConfig, RESOURCES, SLOTS};
use ossim::coordinator::{Coordinator, StopReason};
use ossim::detector::DeadlockDetector;
use ossim::dispatcher::Dispatcher;
use ossim::message::{reply_channel, Message};
use ossim::process_table::ProcessTable;
use ossim::reporter::{allocation_snapshot, open_log_file, summary, LineLog};
use ossim::resource_table::ResourceTable;
use ossim::rng::test_support::ScriptedRng;
use ossim::rng::{RngSource, SystemRng};
use ossim::stats::Stats;

fn new_tables() -> (ProcessTable, ResourceTable) {
    (ProcessTable::new(), ResourceTable::new(RESOURCES, 10, SLOTS))
}

fn sink() -> LineLog<Vec<u8>> {
    LineLog::new(Vec::new())
}

/// Scenario: a single worker requests within its claim and is granted
/// immediately; releasing frees it back to the pool with no waiters
/// affected (spec §8 scenario 1).
#[test]
fn trivial_request_is_granted_and_released_without_waiters() {
    let (mut processes, mut resources) = new_tables();
    let mut admission = AdmissionController::new(1, SLOTS, 0);
    let mut rng = ScriptedRng::new(vec![4]); // maxClaim sample

    let (slot, worker_id, max_claim) = admission
        .try_admit(LogicalClock::zero(), &mut processes, &mut rng)
        .expect("first admission always succeeds into an empty table");
    assert_eq!(max_claim[0], 4);

    let mut dispatcher = Dispatcher::new();
    let (reply_tx, reply_rx) = reply_channel();
    dispatcher.register(worker_id, reply_tx);
    let mut stats = Stats::default();
    let mut log = sink();
    let (request_tx, request_rx) = ossim::message::request_channel();

    request_tx
        .send(Message::Request {
            worker_id,
            resource: 0,
            quantity: 2,
        })
        .unwrap();
    dispatcher.drain(
        &request_rx,
        &mut processes,
        &mut resources,
        &mut stats,
        &mut log,
        LogicalClock::zero(),
        true,
    );

    assert_eq!(stats.granted_instantly, 1);
    assert_eq!(processes.get(slot).holdings[0], 2);
    let grant = reply_rx.try_recv().expect("instant grant reply");
    assert_eq!(grant.quantity, 2);

    request_tx
        .send(Message::Release {
            worker_id,
            resource: 0,
        })
        .unwrap();
    dispatcher.drain(
        &request_rx,
        &mut processes,
        &mut resources,
        &mut stats,
        &mut log,
        LogicalClock::zero(),
        true,
    );
    assert_eq!(processes.get(slot).holdings[0], 0);
    assert_eq!(resources.available(0), 10);
}

/// Scenario: a second worker's request exceeds what's left, queues, and
/// is granted FIFO-in-order once the holder releases (spec §8 scenario 2).
#[test]
fn queued_request_is_granted_in_fifo_order_after_release() {
    let (mut processes, mut resources) = new_tables();
    let mut admission = AdmissionController::new(3, SLOTS, 0);
    let mut rng = ScriptedRng::new(vec![10]); // maxClaim = 10 for everyone

    let (_slot_a, worker_a, _) = admission
        .try_admit(LogicalClock::zero(), &mut processes, &mut rng)
        .unwrap();
    let (_slot_b, worker_b, _) = admission
        .try_admit(LogicalClock::zero(), &mut processes, &mut rng)
        .unwrap();
    let (_slot_c, worker_c, _) = admission
        .try_admit(LogicalClock::zero(), &mut processes, &mut rng)
        .unwrap();

    let mut dispatcher = Dispatcher::new();
    let (tx_a, _rx_a) = reply_channel();
    let (tx_b, rx_b) = reply_channel();
    let (tx_c, rx_c) = reply_channel();
    dispatcher.register(worker_a, tx_a);
    dispatcher.register(worker_b, tx_b);
    dispatcher.register(worker_c, tx_c);
    let mut stats = Stats::default();
    let mut log = sink();
    let (request_tx, request_rx) = ossim::message::request_channel();

    // A takes all ten units of R0.
    request_tx
        .send(Message::Request {
            worker_id: worker_a,
            resource: 0,
            quantity: 10,
        })
        .unwrap();
    dispatcher.drain(&request_rx, &mut processes, &mut resources, &mut stats, &mut log, LogicalClock::zero(), false);
    assert_eq!(stats.granted_instantly, 1);

    // B and C both queue, in that order.
    request_tx
        .send(Message::Request {
            worker_id: worker_b,
            resource: 0,
            quantity: 6,
        })
        .unwrap();
    request_tx
        .send(Message::Request {
            worker_id: worker_c,
            resource: 0,
            quantity: 4,
        })
        .unwrap();
    dispatcher.drain(&request_rx, &mut processes, &mut resources, &mut stats, &mut log, LogicalClock::zero(), false);
    assert!(rx_b.try_recv().is_err());
    assert!(rx_c.try_recv().is_err());

    // A releases; both B and C can now be satisfied in FIFO order.
    request_tx
        .send(Message::Release {
            worker_id: worker_a,
            resource: 0,
        })
        .unwrap();
    dispatcher.drain(&request_rx, &mut processes, &mut resources, &mut stats, &mut log, LogicalClock::zero(), false);

    let grant_b = rx_b.try_recv().expect("B should be unblocked first");
    assert_eq!(grant_b.quantity, 6);
    let grant_c = rx_c.try_recv().expect("C should be unblocked next");
    assert_eq!(grant_c.quantity, 4);
    assert_eq!(stats.granted_after_wait, 2);
    assert_eq!(resources.available(0), 0);
}

/// Scenario: two workers form a classic circular wait; the detector
/// breaks it within the same simulated second it's detected in, and the
/// survivor's queued request is then satisfied (spec §8 scenario 3).
#[test]
fn classic_deadlock_is_detected_and_resolved_same_second() {
    let (mut processes, mut resources) = new_tables();
    processes.admit(0, 1, LogicalClock::zero(), [10, 10, 0, 0, 0]);
    resources.try_allocate(0, 0, 10);
    processes.get_mut(0).holdings[0] = 10;
    processes.get_mut(0).blocked = true;
    resources.enqueue_waiter(0, 1);

    processes.admit(1, 2, LogicalClock::zero(), [10, 10, 0, 0, 0]);
    resources.try_allocate(1, 1, 10);
    processes.get_mut(1).holdings[1] = 10;
    processes.get_mut(1).blocked = true;
    resources.enqueue_waiter(1, 0);

    let mut dispatcher = Dispatcher::new();
    let (tx_a, rx_a) = reply_channel();
    let (tx_b, rx_b) = reply_channel();
    dispatcher.register(1, tx_a);
    dispatcher.register(2, tx_b);

    let mut detector = DeadlockDetector::new();
    let mut stats = Stats::default();
    let mut log = sink();
    let now = LogicalClock::zero();

    let victim = detector.run(now, &mut processes, &mut resources, &mut dispatcher, &mut stats, &mut log, true);
    assert!(victim.is_some());
    assert_eq!(stats.deadlock_terminations, 1);

    // Worker 1 held all of R0 and wanted R1; worker 2 held all of R1 and
    // wanted R0. Whichever is picked as victim, releasing its holdings
    // makes the other's want satisfiable, so the survivor should have
    // received its grant in the same pass.
    let victim_id = victim.unwrap();
    let survivor_rx = if victim_id == 1 { &rx_b } else { &rx_a };
    assert!(
        survivor_rx.try_recv().is_ok(),
        "survivor should be unblocked in the same pass"
    );

    // A second detector run within the same simulated second is a no-op.
    let again = detector.run(now, &mut processes, &mut resources, &mut dispatcher, &mut stats, &mut log, false);
    assert!(again.is_none());
    assert_eq!(stats.deadlock_detected_run, 1);
}

/// Scenario: `-s 30` with `SLOTS == 20` clamps to 20, and the admission
/// controller honors that clamp independent of how many more workers are
/// still waiting to launch (spec §8 scenario 4).
#[test]
fn concurrency_cap_above_table_capacity_clamps_and_is_enforced() {
    let cli = Cli {
        total_processes: 25,
        concurrency_cap: 30,
        launch_interval_ms: 1,
        log_path: std::path::PathBuf::from("oss.log"),
        verbose: false,
    };
    let config = cli.into_run_config().expect("valid arguments");
    assert_eq!(config.concurrency_cap, SLOTS);

    let mut admission = AdmissionController::new(config.total_processes, config.concurrency_cap, 0);
    let mut processes = ProcessTable::new();
    let mut rng = ScriptedRng::new(vec![1]);

    for _ in 0..SLOTS {
        assert!(admission
            .try_admit(LogicalClock::zero(), &mut processes, &mut rng)
            .is_some());
    }
    // The 21st admission is refused even though 5 more are still owed
    // against `total_processes`.
    assert!(admission
        .try_admit(LogicalClock::zero(), &mut processes, &mut rng)
        .is_none());
    assert!(!admission.done_launching());

    // Freeing one slot immediately makes room for the next.
    processes.free(0);
    assert!(admission
        .try_admit(LogicalClock::zero(), &mut processes, &mut rng)
        .is_some());
}

/// Scenario: a pathologically long-running trace hits the 10,000-line
/// cap exactly once, and further snapshots after that are silent
/// no-ops rather than errors (spec §8 scenario 5).
#[test]
fn repeated_allocation_snapshots_hit_the_log_cap_exactly_once() {
    let (processes, resources) = new_tables();
    let mut log = sink();
    let now = LogicalClock::zero();

    // Each snapshot writes 1 + (occupied slot count) lines; with an empty
    // table that's exactly one line per call, so 10,050 calls comfortably
    // cross the 10,000-line cap.
    for _ in 0..10_050 {
        allocation_snapshot(&mut log, now, &resources, &processes);
    }
    assert!(log.cap_reached());
    assert_eq!(log.lines_written(), ossim::config::LOG_LINE_CAP);
}

/// Scenario: the wall-clock budget is the run's hard stop even when
/// plenty of workers are still owed against `total_processes`; the
/// coordinator ends the run (with a summary) rather than hanging (spec
/// §8 scenario 6).
#[test]
fn wall_clock_budget_ends_an_otherwise_unfinished_run() {
    let config = RunConfig {
        total_processes: 40,
        concurrency_cap: 18,
        launch_interval_ms: 500,
        wall_clock_budget: Duration::from_millis(50),
        ..RunConfig::default()
    };
    let log = LineLog::new(Vec::new());
    let rng: Box<dyn RngSource> = Box::new(SystemRng::from_seed(7));
    let shutdown = Arc::new(AtomicBool::new(false));

    let coordinator = Coordinator::new(config, log, rng, shutdown);
    let outcome = coordinator.run();

    assert_eq!(outcome.stop_reason, StopReason::WallClockBudgetExceeded);
}

/// Scenario: the coordinator's log file is opened (created, truncated) at
/// a real path and lines written through it land on disk (spec §6 "Log
/// format: line-oriented UTF-8 text").
#[test]
fn log_file_is_created_and_receives_written_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("oss.log");

    let file = open_log_file(&path).expect("log file should open");
    let mut log = LineLog::new(file);
    log.line("OSS: hello");
    drop(log);

    let contents = std::fs::read_to_string(&path).expect("log file should exist");
    assert!(contents.contains("OSS: hello"));
}

/// Scenario: an unopenable log path (parent directory does not exist) is a
/// startup error, not a runtime one (spec §7 taxonomy item 1).
#[test]
fn unopenable_log_path_is_a_startup_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bogus_path = dir.path().join("no-such-subdir").join("oss.log");

    let err = open_log_file(&bogus_path).expect_err("missing parent directory should fail to open");
    assert!(matches!(err, ossim::error::OssError::LogOpen { .. }));
}

#[test]
fn final_summary_reports_deadlock_resolution_rate() {
    let mut stats = Stats::default();
    stats.total_requests = 12;
    stats.granted_instantly = 8;
    stats.granted_after_wait = 3;
    stats.deadlock_processes = 1;
    stats.deadlock_terminations = 1;
    let mut log = sink();
    summary(&mut log, &stats);
    assert!(log.lines_written() > 0);
}
