// src/main.rs
// oss - resource-allocation and deadlock-resolution simulator

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use ossim::cli::Cli;
use ossim::coordinator::{Coordinator, StopReason};
use ossim::error::Result;
use ossim::reporter::{open_log_file, LineLog};
use ossim::rng::{RngSource, SystemRng};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("OSS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

fn run() -> Result<StopReason> {
    let config = Cli::parse().into_run_config()?;

    let file = open_log_file(&config.log_path)?;
    let log = LineLog::new(file);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_for_handler = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_for_handler.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler; relying on wall-clock/safety-alarm limits only");
    }

    let rng: Box<dyn RngSource> = Box::new(SystemRng::from_entropy());
    let coordinator = Coordinator::new(config, log, rng, shutdown);
    let outcome = coordinator.run();

    tracing::info!(stop_reason = ?outcome.stop_reason, "run complete");
    Ok(outcome.stop_reason)
}

fn main() {
    init_tracing();

    match run() {
        Ok(StopReason::AllWorkersDone) => {}
        Ok(reason @ (StopReason::WallClockBudgetExceeded
        | StopReason::SafetyAlarmTriggered
        | StopReason::ShutdownRequested
        | StopReason::LogCapExhausted)) => {
            // Controlled shutdown before every worker finished is still a
            // nonzero exit (spec §7 taxonomy item 5: wall-clock budget,
            // log-line cap, and SIGINT/SIGALRM all end the run this way).
            eprintln!("oss: run ended by controlled shutdown ({reason:?}) before all workers finished");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("oss: {e}");
            std::process::exit(1);
        }
    }
}
