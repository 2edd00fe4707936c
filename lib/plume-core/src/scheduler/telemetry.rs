use metrics::{Counter, Gauge, Histogram};
use plume_metrics::MetricsBuilder;

use super::SinkOutcome;

#[derive(Clone)]
pub(super) struct SchedulerTelemetry {
    cycles: Counter,
    cycle_duration: Histogram,
    registered_sinks: Gauge,
}

impl SchedulerTelemetry {
    pub fn new() -> Self {
        let builder = MetricsBuilder::default();
        Self {
            cycles: builder.register_counter("export_cycles_total"),
            cycle_duration: builder.register_histogram("export_cycle_duration_seconds"),
            registered_sinks: builder.register_gauge("export_sinks_registered"),
        }
    }

    pub fn cycles(&self) -> &Counter {
        &self.cycles
    }

    pub fn cycle_duration(&self) -> &Histogram {
        &self.cycle_duration
    }

    pub fn registered_sinks(&self) -> &Gauge {
        &self.registered_sinks
    }
}

/// Export outcome counters for a single sink.
#[derive(Clone)]
pub(super) struct SinkExportTelemetry {
    succeeded: Counter,
    failed: Counter,
    timed_out: Counter,
    skipped: Counter,
}

impl SinkExportTelemetry {
    pub fn new(sink_name: &str) -> Self {
        let builder = MetricsBuilder::default().add_default_tag(("sink", sink_name.to_string()));
        Self {
            succeeded: builder.register_counter_with_tags("sink_exports_total", ["outcome:succeeded"]),
            failed: builder.register_counter_with_tags("sink_exports_total", ["outcome:failed"]),
            timed_out: builder.register_counter_with_tags("sink_exports_total", ["outcome:timed_out"]),
            skipped: builder.register_counter_with_tags("sink_exports_total", ["outcome:skipped"]),
        }
    }

    pub fn track(&self, outcome: &SinkOutcome) {
        let counter = match outcome {
            SinkOutcome::Succeeded => &self.succeeded,
            SinkOutcome::Failed(_) => &self.failed,
            SinkOutcome::TimedOut => &self.timed_out,
            SinkOutcome::Skipped => &self.skipped,
        };
        counter.increment(1);
    }
}
