//! Error taxonomy for the coordinator (spec §7).
//!
//! Startup errors are the only ones that propagate out of `main`; every
//! other category listed in the spec (transient drain errors, stale-slot
//! messages, detected deadlocks) is handled internally and never surfaces
//! as an `OssError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OssError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to open log file {path}: {source}")]
    LogOpen {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set up message channel: {0}")]
    Channel(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OssError>;
