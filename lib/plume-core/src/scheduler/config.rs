use std::time::Duration;

use snafu::{ensure, Snafu};

/// A scheduler configuration error.
#[derive(Debug, Eq, PartialEq, Snafu)]
#[snafu(context(suffix(false)))]
pub enum SchedulerConfigError {
    /// The export interval is zero.
    #[snafu(display("export interval must be greater than zero"))]
    ZeroInterval,

    /// The per-cycle timeout is longer than the export interval.
    #[snafu(display(
        "export timeout ({:?}) must not be longer than the export interval ({:?})",
        timeout,
        interval
    ))]
    TimeoutExceedsInterval { timeout: Duration, interval: Duration },
}

/// Export scheduler timing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SchedulerConfiguration {
    interval: Duration,
    timeout: Duration,
}

impl SchedulerConfiguration {
    /// Creates a new `SchedulerConfiguration`.
    ///
    /// # Errors
    ///
    /// If the interval is zero, or the timeout is longer than the interval, an error is returned.
    pub fn new(interval: Duration, timeout: Duration) -> Result<Self, SchedulerConfigError> {
        ensure!(!interval.is_zero(), ZeroInterval);
        ensure!(timeout <= interval, TimeoutExceedsInterval { timeout, interval });

        Ok(Self { interval, timeout })
    }

    /// Returns the time between the start of two export cycles.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns how long a cycle waits for its sinks before giving up on them.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
