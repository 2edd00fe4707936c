use metrics::Counter;
use plume_metrics::MetricsBuilder;

/// Sink-specific telemetry.
///
/// Counts how much of each batch a sink's translator turned into series, and how many samples it had nothing to export
/// for.
#[derive(Clone)]
pub struct SinkTelemetry {
    series_translated: Counter,
    samples_dropped: Counter,
}

impl SinkTelemetry {
    /// Creates a new `SinkTelemetry` tagged with the given sink name.
    pub fn new(sink_name: &str) -> Self {
        let builder = MetricsBuilder::default().add_default_tag(("sink", sink_name.to_string()));
        Self::from_builder(&builder)
    }

    /// Creates a new `SinkTelemetry` with the default tags of the given builder.
    pub fn from_builder(builder: &MetricsBuilder) -> Self {
        Self {
            series_translated: builder.register_counter("sink_series_translated_total"),
            samples_dropped: builder.register_counter("sink_samples_dropped_total"),
        }
    }

    pub fn series_translated(&self) -> &Counter {
        &self.series_translated
    }

    pub fn samples_dropped(&self) -> &Counter {
        &self.samples_dropped
    }
}
