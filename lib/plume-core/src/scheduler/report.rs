use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};

use crate::sinks::ExportError;

/// Where the export scheduler is within a cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchedulerState {
    /// Waiting for the next tick.
    Idle,

    /// Pulling a snapshot from the metric source.
    Collecting,

    /// Waiting on sinks to export the snapshot.
    Dispatching,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Collecting => f.write_str("collecting"),
            Self::Dispatching => f.write_str("dispatching"),
        }
    }
}

/// The result of one sink's export within a cycle.
#[derive(Debug)]
pub enum SinkOutcome {
    /// The sink exported the batch.
    Succeeded,

    /// The sink reported an error.
    Failed(ExportError),

    /// The sink did not finish before the cycle deadline. Its task keeps running, and its result is discarded.
    TimedOut,

    /// The sink was still busy with an earlier cycle's batch and was not handed this one.
    Skipped,
}

impl SinkOutcome {
    /// Returns the outcome name used in logs and telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
            Self::Skipped => "skipped",
        }
    }

    /// Returns `true` if the sink exported the batch.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Per-sink outcomes of one export cycle.
#[derive(Debug)]
pub struct CycleReport {
    batch_timestamp: DateTime<Utc>,
    duration: Duration,
    outcomes: Vec<(String, SinkOutcome)>,
}

impl CycleReport {
    pub(super) fn new(
        batch_timestamp: DateTime<Utc>, duration: Duration, outcomes: Vec<(String, SinkOutcome)>,
    ) -> Self {
        Self {
            batch_timestamp,
            duration,
            outcomes,
        }
    }

    /// Returns the collection timestamp of the exported batch.
    pub fn batch_timestamp(&self) -> DateTime<Utc> {
        self.batch_timestamp
    }

    /// Returns how long the cycle took, from snapshot pull to the last sink outcome.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the outcome of every registered sink, in registration order.
    pub fn outcomes(&self) -> &[(String, SinkOutcome)] {
        &self.outcomes
    }

    /// Returns the outcome of the first sink with the given name.
    pub fn outcome(&self, sink: &str) -> Option<&SinkOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == sink)
            .map(|(_, outcome)| outcome)
    }

    /// Returns `true` if every sink exported the batch.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_success())
    }

    pub(super) fn count(&self, outcome_name: &str) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.as_str() == outcome_name)
            .count()
    }
}
