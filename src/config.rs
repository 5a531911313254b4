use std::time::Duration;

use anyhow::{bail, Result};

/// Fewest workers used by default, even on small machines.
pub const MIN_DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings consumed by the scanning core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Number of concurrent workers, and therefore the maximum number of probes in flight.
    pub workers: usize,
    /// Per-request timeout, applied to both the primary probe and the CORS check.
    pub timeout: Duration,
    pub cors_check: bool,
    /// Only affects how much the reporter prints.
    pub quiet: bool,
}

impl ScanConfig {
    pub fn new(workers: usize, timeout: Duration, cors_check: bool, quiet: bool) -> Result<Self> {
        if workers == 0 {
            bail!("worker count must be at least 1");
        }
        if timeout.is_zero() {
            bail!("request timeout must be greater than zero");
        }
        Ok(Self {
            workers,
            timeout,
            cors_check,
            quiet,
        })
    }

    /// Available CPU parallelism, but never fewer than [`MIN_DEFAULT_WORKERS`].
    pub fn default_workers() -> usize {
        num_cpus::get().max(MIN_DEFAULT_WORKERS)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            timeout: DEFAULT_TIMEOUT,
            cors_check: false,
            quiet: false,
        }
    }
}
