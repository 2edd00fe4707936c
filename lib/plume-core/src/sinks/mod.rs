//! Sink basics.
//!
//! A sink takes a metric batch and emits it to an external backend. [`TranslatingSink`] is the standard shape: a
//! [`Translator`] turns the batch into backend time series, and a [`Transport`] delivers them.

use async_trait::async_trait;
use plume_error::GenericError;
use snafu::Snafu;
use tracing::debug;

use crate::{
    data_model::{MetricBatch, TimeSeries},
    translate::{translate_batch, Translator},
};

mod builder;
pub use self::builder::SinkBuilder;

mod telemetry;
pub use self::telemetry::SinkTelemetry;

/// A sink export error.
#[derive(Debug, Snafu)]
pub enum ExportError {
    /// The transport failed to deliver the translated batch.
    #[snafu(display("sink '{}' failed to send {} series: {}", sink, series, source))]
    Transport {
        /// Name of the sink.
        sink: String,

        /// Number of series in the failed payload.
        series: usize,

        /// Transport error.
        source: GenericError,
    },

    /// The export task panicked before finishing.
    #[snafu(display("sink '{}' panicked during export", sink))]
    Panicked {
        /// Name of the sink.
        sink: String,
    },
}

impl ExportError {
    /// Returns the name of the sink that failed.
    pub fn sink(&self) -> &str {
        match self {
            Self::Transport { sink, .. } | Self::Panicked { sink } => sink,
        }
    }
}

/// A sink.
///
/// Sinks are handed the same immutable batch on each export cycle. An export either delivers the batch or returns an
/// error describing the failure; sinks never retry internally, and a failed batch is not resent later.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Returns the name of the sink, used in logs and telemetry.
    fn name(&self) -> &str;

    /// Exports the batch.
    ///
    /// # Errors
    ///
    /// If the batch could not be delivered, an error is returned.
    async fn export(&self, batch: &MetricBatch) -> Result<(), ExportError>;
}

/// Delivers translated time series to a backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the series to the backend.
    ///
    /// # Errors
    ///
    /// If the backend could not be reached or rejected the payload, an error is returned.
    async fn send(&self, series: Vec<TimeSeries>) -> Result<(), GenericError>;
}

/// A sink that translates each batch and hands the result to a transport.
pub struct TranslatingSink<T, X> {
    name: String,
    translator: T,
    transport: X,
    telemetry: SinkTelemetry,
}

impl<T, X> TranslatingSink<T, X>
where
    T: Translator,
    X: Transport,
{
    /// Creates a new `TranslatingSink`.
    pub fn new<N>(name: N, translator: T, transport: X) -> Self
    where
        N: Into<String>,
    {
        let name = name.into();
        let telemetry = SinkTelemetry::new(&name);
        Self {
            name,
            translator,
            transport,
            telemetry,
        }
    }
}

#[async_trait]
impl<T, X> Sink for TranslatingSink<T, X>
where
    T: Translator,
    X: Transport,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, batch: &MetricBatch) -> Result<(), ExportError> {
        let translated = translate_batch(&self.translator, batch);
        let series_len = translated.series.len();

        self.telemetry.series_translated().increment(series_len as u64);
        self.telemetry.samples_dropped().increment(translated.dropped as u64);

        if translated.series.is_empty() {
            debug!(sink = %self.name, metric_sets = batch.len(), "Nothing to export.");
            return Ok(());
        }

        debug!(sink = %self.name, series = series_len, dropped = translated.dropped, "Sending translated batch.");

        self.transport
            .send(translated.series)
            .await
            .map_err(|source| ExportError::Transport {
                sink: self.name.clone(),
                series: series_len,
                source,
            })
    }
}
