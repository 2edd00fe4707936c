//! Every registered metric, exported verbatim under a configurable prefix.

use std::sync::Arc;

use async_trait::async_trait;
use plume_core::{
    data_model::DescriptorRegistry,
    sinks::{Sink, SinkBuilder, TranslatingSink},
    translate::PassthroughTranslator,
};
use plume_error::GenericError;
use serde::Deserialize;

use super::common::{HttpTransport, HttpTransportConfiguration};

fn default_name() -> String {
    "passthrough".to_string()
}

/// Passthrough sink.
///
/// Exports every metric in the standard descriptor registry under `<prefix>/<metric name>`, with its raw value and
/// all of its resource labels, posted as JSON to the configured endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct PassthroughConfiguration {
    /// Name of the sink.
    ///
    /// Defaults to `passthrough`.
    #[serde(default = "default_name")]
    name: String,

    /// External type prefix.
    prefix: String,

    #[serde(flatten)]
    http: HttpTransportConfiguration,
}

#[async_trait]
impl SinkBuilder for PassthroughConfiguration {
    fn sink_name(&self) -> &str {
        &self.name
    }

    async fn build(&self) -> Result<Arc<dyn Sink>, GenericError> {
        let translator = PassthroughTranslator::new(self.prefix.clone(), Arc::new(DescriptorRegistry::standard()));
        let transport = HttpTransport::from_configuration(&self.http)?;
        Ok(Arc::new(TranslatingSink::new(self.name.clone(), translator, transport)))
    }
}
