//! A sink that logs what it would have sent and discards it.

use std::sync::Arc;

use async_trait::async_trait;
use plume_core::{
    data_model::{DescriptorRegistry, TimeSeries},
    sinks::{Sink, SinkBuilder, TranslatingSink, Transport},
    translate::PassthroughTranslator,
};
use plume_error::GenericError;
use serde::Deserialize;
use tracing::info;

fn default_name() -> String {
    "blackhole".to_string()
}

/// Blackhole sink.
///
/// Translates every batch like the passthrough sink, then logs how many series it would have sent and discards them.
/// It's useful for testing, providing a valid sink without needing a backend.
#[derive(Clone, Debug, Deserialize)]
pub struct BlackholeConfiguration {
    /// Name of the sink.
    ///
    /// Defaults to `blackhole`.
    #[serde(default = "default_name")]
    name: String,
}

impl Default for BlackholeConfiguration {
    fn default() -> Self {
        Self { name: default_name() }
    }
}

#[async_trait]
impl SinkBuilder for BlackholeConfiguration {
    fn sink_name(&self) -> &str {
        &self.name
    }

    async fn build(&self) -> Result<Arc<dyn Sink>, GenericError> {
        let translator = PassthroughTranslator::new("blackhole", Arc::new(DescriptorRegistry::standard()));
        let transport = LogTransport {
            sink_name: self.name.clone(),
        };
        Ok(Arc::new(TranslatingSink::new(self.name.clone(), translator, transport)))
    }
}

/// Logs the size of each payload, then drops it.
struct LogTransport {
    sink_name: String,
}

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, series: Vec<TimeSeries>) -> Result<(), GenericError> {
        info!(sink = %self.sink_name, series = series.len(), "Discarded translated batch.");
        Ok(())
    }
}
