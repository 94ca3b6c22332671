//! Sizing constants and derived run configuration.
//!
//! The sizing constants are compile-time choices per the spec, not CLI
//! knobs: `SLOTS`, `R`, and `INSTANCES` are fixed so that array-backed
//! tables (process table, per-resource holdings) can stay plain arrays
//! instead of growable collections.

/// Fixed process-table capacity.
pub const SLOTS: usize = 20;
/// Number of distinct resource classes.
pub const RESOURCES: usize = 5;
/// Instances available per resource class.
pub const INSTANCES: u32 = 10;

/// Deadlock detector cadence: once per whole simulated second.
pub const DETECTOR_PERIOD_SECS: u64 = 1;
/// Allocation snapshot cadence.
pub const REPORT_PERIOD_NANOS: u64 = 500_000_000;
/// Compact allocation snapshot cadence, in grants.
pub const SNAPSHOT_GRANT_PERIOD: u64 = 20;
/// Hard cap on log lines written (spec §6).
pub const LOG_LINE_CAP: u64 = 10_000;

/// Bounds on the per-tick clock jitter (spec §4.E/Main Loop sequencing).
pub const TICK_JITTER_MIN_NANOS: u64 = 10_000;
pub const TICK_JITTER_MAX_NANOS: u64 = 100_000;

/// Fully resolved run configuration, derived from validated CLI input.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub total_processes: u32,
    pub concurrency_cap: usize,
    pub launch_interval_ms: u64,
    pub log_path: std::path::PathBuf,
    pub verbose: bool,
    /// Wall-clock kill-switch, default 5s (spec §5).
    pub wall_clock_budget: std::time::Duration,
    /// Safety alarm, default 60s (spec §5).
    pub safety_alarm: std::time::Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            total_processes: 40,
            concurrency_cap: 18,
            launch_interval_ms: 500,
            log_path: std::path::PathBuf::from("oss.log"),
            verbose: false,
            wall_clock_budget: std::time::Duration::from_secs(5),
            safety_alarm: std::time::Duration::from_secs(60),
        }
    }
}
