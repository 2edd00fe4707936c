//! Sink implementations.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use plume_core::sinks::{Sink, SinkBuilder};
use plume_error::{generic_error, ErrorContext as _, GenericError};
use serde::Deserialize;
use tracing::info;

pub mod blackhole;
pub mod cloud_monitoring;
pub mod common;
pub mod passthrough;

use self::{
    blackhole::BlackholeConfiguration, cloud_monitoring::CloudMonitoringConfiguration,
    passthrough::PassthroughConfiguration,
};

/// Configuration of a single sink, selected by its `type` field.
///
/// ```yaml
/// sinks:
///   - type: cloud_monitoring
///     endpoint: https://monitoring.example.com/v3/projects/demo/timeSeries
///   - type: blackhole
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfiguration {
    /// Cloud Monitoring container metrics.
    CloudMonitoring(CloudMonitoringConfiguration),

    /// Every registered metric under a custom prefix.
    Passthrough(PassthroughConfiguration),

    /// Discards everything.
    Blackhole(BlackholeConfiguration),
}

impl SinkConfiguration {
    fn builder(&self) -> &(dyn SinkBuilder + Send + Sync) {
        match self {
            Self::CloudMonitoring(config) => config,
            Self::Passthrough(config) => config,
            Self::Blackhole(config) => config,
        }
    }
}

#[async_trait]
impl SinkBuilder for SinkConfiguration {
    fn sink_name(&self) -> &str {
        self.builder().sink_name()
    }

    async fn build(&self) -> Result<Arc<dyn Sink>, GenericError> {
        self.builder().build().await
    }
}

/// Builds every configured sink.
///
/// # Errors
///
/// If two sinks share a name, or any sink fails to build, an error is returned.
pub async fn build_sinks(configs: &[SinkConfiguration]) -> Result<Vec<Arc<dyn Sink>>, GenericError> {
    let mut names = HashSet::new();
    let mut sinks = Vec::with_capacity(configs.len());

    for config in configs {
        let name = config.sink_name();
        if !names.insert(name) {
            return Err(generic_error!("Sink name '{}' is used more than once.", name));
        }

        let sink = config
            .build()
            .await
            .with_error_context(|| format!("Failed to build sink '{}'.", name))?;
        info!(sink = name, "Built sink.");
        sinks.push(sink);
    }

    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: serde_json::Value) -> Vec<SinkConfiguration> {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn builds_configured_sinks_in_order() {
        let configs = parse(serde_json::json!([
            { "type": "cloud_monitoring", "endpoint": "http://localhost:9/v3/timeSeries" },
            {
                "type": "passthrough",
                "name": "archive",
                "prefix": "custom.example.com",
                "endpoint": "http://localhost:9/",
            },
            { "type": "blackhole" },
        ]));

        let sinks = build_sinks(&configs).await.unwrap();
        let names = sinks.iter().map(|sink| sink.name()).collect::<Vec<_>>();
        assert_eq!(names, vec!["cloud_monitoring", "archive", "blackhole"]);
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let configs = parse(serde_json::json!([
            { "type": "blackhole", "name": "discard" },
            { "type": "blackhole", "name": "discard" },
        ]));

        let err = build_sinks(&configs).await.err().unwrap();
        assert_eq!(err.to_string(), "Sink name 'discard' is used more than once.");
    }

    #[tokio::test]
    async fn invalid_sink_is_reported_by_name() {
        let configs = parse(serde_json::json!([
            { "type": "cloud_monitoring", "endpoint": "http://localhost:9/", "max_series_per_request": 0 },
        ]));

        let err = build_sinks(&configs).await.err().unwrap();
        assert_eq!(err.to_string(), "Failed to build sink 'cloud_monitoring'.");
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_value::<SinkConfiguration>(serde_json::json!({ "type": "carrier_pigeon" }));
        assert!(result.is_err());
    }
}
