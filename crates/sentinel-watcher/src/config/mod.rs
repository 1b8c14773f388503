pub mod cli;

use std::time::Duration;

use thiserror::Error;

pub use cli::*;

/// Fixed delays of the watch/reset protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Wait before the first watch so the API server can settle.
    pub startup_delay: Duration,
    /// Wait before resubscribing after the watch ends or fails.
    pub watch_backoff: Duration,
    /// Minimum gap between two consecutive sentinel resets.
    pub reset_pacing: Duration,
    /// Upper bound on one coordinator wait before re-checking the stop flag.
    pub event_wait_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(10),
            watch_backoff: Duration::from_secs(5),
            reset_pacing: Duration::from_secs(30),
            event_wait_timeout: Duration::from_secs(30),
        }
    }
}

/// Startup configuration problems. These are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}
