//! Periodic export of metric snapshots to every registered sink.
//!
//! Each tick the scheduler pulls one snapshot from its [`MetricSource`], hands the same immutable batch to every sink
//! in its own task, and waits for all of them or the cycle deadline, whichever comes first. A sink that fails, hangs,
//! or panics only affects its own outcome. There is no retry: a batch a sink failed to export is gone, and the next
//! cycle carries the next snapshot.

use std::{collections::HashMap, future::Future, sync::Arc, time::Instant as StdInstant};

use plume_error::GenericError;
use tokio::{
    pin, select,
    sync::{watch, Semaphore},
    task::JoinSet,
    time::{interval_at, timeout_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    data_model::MetricBatch,
    sinks::{ExportError, Sink},
    sources::MetricSource,
    task::JoinSetExt as _,
};

mod config;
pub use self::config::{SchedulerConfigError, SchedulerConfiguration};

mod report;
pub use self::report::{CycleReport, SchedulerState, SinkOutcome};

mod telemetry;
use self::telemetry::{SchedulerTelemetry, SinkExportTelemetry};

struct RegisteredSink {
    sink: Arc<dyn Sink>,
    in_flight: Arc<Semaphore>,
    telemetry: SinkExportTelemetry,
}

/// Drives export cycles against a fixed set of sinks.
pub struct ExportScheduler {
    config: SchedulerConfiguration,
    source: Arc<dyn MetricSource>,
    sinks: Vec<RegisteredSink>,
    state_tx: watch::Sender<SchedulerState>,
    telemetry: SchedulerTelemetry,
}

impl ExportScheduler {
    /// Creates a new `ExportScheduler` with no sinks.
    pub fn new<S>(config: SchedulerConfiguration, source: S) -> Self
    where
        S: MetricSource + 'static,
    {
        let (state_tx, _) = watch::channel(SchedulerState::Idle);
        Self {
            config,
            source: Arc::new(source),
            sinks: Vec::new(),
            state_tx,
            telemetry: SchedulerTelemetry::new(),
        }
    }

    /// Registers a sink.
    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.add_sink(sink);
        self
    }

    /// Registers a sink.
    pub fn add_sink(&mut self, sink: Arc<dyn Sink>) {
        let telemetry = SinkExportTelemetry::new(sink.name());
        self.telemetry.registered_sinks().increment(1.0);
        self.sinks.push(RegisteredSink {
            sink,
            in_flight: Arc::new(Semaphore::new(1)),
            telemetry,
        });
    }

    /// Returns the names of the registered sinks, in registration order.
    pub fn sink_names(&self) -> impl Iterator<Item = &str> {
        self.sinks.iter().map(|registered| registered.sink.name())
    }

    /// Returns the scheduler configuration.
    pub fn config(&self) -> &SchedulerConfiguration {
        &self.config
    }

    /// Subscribes to scheduler state changes.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state_tx.subscribe()
    }

    /// Runs a single export cycle.
    ///
    /// # Errors
    ///
    /// If the metric source cannot produce a snapshot, an error is returned and no sink is called.
    pub async fn run_cycle(&self) -> Result<CycleReport, GenericError> {
        let started = StdInstant::now();

        self.state_tx.send_replace(SchedulerState::Collecting);
        let batch = match self.source.latest_batch() {
            Ok(batch) => batch,
            Err(e) => {
                self.state_tx.send_replace(SchedulerState::Idle);
                return Err(e);
            }
        };

        self.state_tx.send_replace(SchedulerState::Dispatching);
        let outcomes = self.dispatch(Arc::clone(&batch)).await;
        self.state_tx.send_replace(SchedulerState::Idle);

        let outcomes = self
            .sinks
            .iter()
            .zip(outcomes)
            .map(|(registered, outcome)| {
                registered.telemetry.track(&outcome);
                (registered.sink.name().to_string(), outcome)
            })
            .collect();

        let report = CycleReport::new(batch.timestamp(), started.elapsed(), outcomes);
        self.telemetry.cycles().increment(1);
        self.telemetry.cycle_duration().record(report.duration().as_secs_f64());

        for (sink, outcome) in report.outcomes() {
            match outcome {
                SinkOutcome::Failed(e) => warn!(sink, error = %e, "Sink failed to export batch."),
                SinkOutcome::TimedOut => warn!(
                    sink,
                    timeout_secs = self.config.timeout().as_secs_f64(),
                    "Sink did not finish exporting before the cycle deadline."
                ),
                SinkOutcome::Skipped => warn!(sink, "Sink is still exporting an earlier batch. Skipping."),
                SinkOutcome::Succeeded => {}
            }
        }

        debug!(
            metric_sets = batch.len(),
            succeeded = report.count("succeeded"),
            failed = report.count("failed"),
            timed_out = report.count("timed_out"),
            skipped = report.count("skipped"),
            elapsed_ms = report.duration().as_millis() as u64,
            "Export cycle complete."
        );

        Ok(report)
    }

    async fn dispatch(&self, batch: Arc<MetricBatch>) -> Vec<SinkOutcome> {
        let deadline = Instant::now() + self.config.timeout();
        let mut outcomes: Vec<Option<SinkOutcome>> = self.sinks.iter().map(|_| None).collect();
        let mut task_indexes = HashMap::new();
        let mut tasks = JoinSet::new();

        for (idx, registered) in self.sinks.iter().enumerate() {
            let permit = match Arc::clone(&registered.in_flight).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    outcomes[idx] = Some(SinkOutcome::Skipped);
                    continue;
                }
            };

            let sink = Arc::clone(&registered.sink);
            let batch = Arc::clone(&batch);
            let handle = tasks.spawn_traced(async move {
                let result = sink.export(&batch).await;
                drop(permit);
                (idx, result)
            });
            task_indexes.insert(handle.id(), idx);
        }

        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((idx, result)))) => {
                    outcomes[idx] = Some(match result {
                        Ok(()) => SinkOutcome::Succeeded,
                        Err(e) => SinkOutcome::Failed(e),
                    });
                }
                Ok(Some(Err(e))) => {
                    if let Some(&idx) = task_indexes.get(&e.id()) {
                        let sink = self.sinks[idx].sink.name().to_string();
                        outcomes[idx] = Some(SinkOutcome::Failed(ExportError::Panicked { sink }));
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    // Stragglers keep running so they can release their permit; their results are dropped.
                    tasks.detach_all();
                    break;
                }
            }
        }

        outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or(SinkOutcome::TimedOut))
            .collect()
    }

    /// Runs export cycles on a fixed interval until `shutdown` resolves.
    ///
    /// The first cycle starts one interval after this is called. Ticks missed while a cycle overruns are skipped
    /// rather than run back to back. A cycle in progress when `shutdown` resolves is finished first.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let interval = self.config.interval();
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        pin!(shutdown);

        info!(
            interval_secs = interval.as_secs_f64(),
            timeout_secs = self.config.timeout().as_secs_f64(),
            sinks = self.sinks.len(),
            "Export scheduler started."
        );

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("Export scheduler stopping.");
                    break;
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        warn!(error = %e, "No metric snapshot available. Skipping export cycle.");
                    }
                }
            }
        }
    }
}
