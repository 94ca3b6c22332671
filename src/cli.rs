//! Command-line surface (spec §6): `oss [-h] [-n N] [-s S] [-i I] [-f F] [-v]`.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{RunConfig, SLOTS};
use crate::error::{OssError, Result};

#[derive(Parser, Debug)]
#[command(
    name = "oss",
    about = "Teaching-style OS resource-allocation and deadlock-resolution simulator"
)]
pub struct Cli {
    /// Total number of worker processes to launch over the run.
    #[arg(short = 'n', long = "total", default_value_t = 40)]
    pub total_processes: i64,

    /// Maximum number of workers active at once (clamped to SLOTS).
    #[arg(short = 's', long = "simul", default_value_t = 18)]
    pub concurrency_cap: i64,

    /// Minimum interval, in milliseconds, between successive launches.
    #[arg(short = 'i', long = "interval", default_value_t = 500)]
    pub launch_interval_ms: i64,

    /// Path of the trace/log file to write.
    #[arg(short = 'f', long = "file", default_value = "oss.log")]
    pub log_path: PathBuf,

    /// Enable per-message request/grant/block/release/unblock trace lines.
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    pub verbose: bool,
}

impl Cli {
    /// Validate and convert parsed flags into a `RunConfig`.
    ///
    /// Boundary behavior (spec §8): `concurrencyCap` above `SLOTS` is
    /// clamped, not rejected; `interval_ms == 0` or `N_total <= 0` are
    /// rejected at the CLI.
    pub fn into_run_config(self) -> Result<RunConfig> {
        if self.total_processes <= 0 {
            return Err(OssError::InvalidArgument(
                "total child processes must be at least one".into(),
            ));
        }
        if self.concurrency_cap < 0 {
            return Err(OssError::InvalidArgument(
                "concurrency cap must not be negative".into(),
            ));
        }
        if self.launch_interval_ms <= 0 {
            return Err(OssError::InvalidArgument(
                "launch interval must be positive".into(),
            ));
        }

        let concurrency_cap = (self.concurrency_cap as usize).min(SLOTS);
        if self.concurrency_cap as usize > SLOTS {
            tracing::warn!(
                requested = self.concurrency_cap,
                clamped_to = SLOTS,
                "concurrency cap exceeds process table capacity; clamping"
            );
        }

        Ok(RunConfig {
            total_processes: self.total_processes as u32,
            concurrency_cap,
            launch_interval_ms: self.launch_interval_ms as u64,
            log_path: self.log_path,
            verbose: self.verbose,
            ..RunConfig::default()
        })
    }
}
