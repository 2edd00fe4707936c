//! Cloud Monitoring container metrics.

use std::sync::Arc;

use async_trait::async_trait;
use plume_core::{
    data_model::labels::{
        ResourceType, LABEL_CONTAINER_NAME, LABEL_NAMESPACE_NAME, LABEL_NODENAME, LABEL_POD_NAME, LABEL_RESOURCE_ID,
    },
    sinks::{Sink, SinkBuilder, TranslatingSink},
    translate::{LabelRules, MappingTable, MetricMapping, TableTranslator},
};
use plume_error::GenericError;
use serde::Deserialize;

use super::common::{HttpTransport, HttpTransportConfiguration};

/// Default external type prefix for container metrics.
pub const DEFAULT_PREFIX: &str = "container.googleapis.com/container";

const MILLIS_PER_SECOND: f64 = 1_000.0;
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
const MILLICORES_PER_CORE: f64 = 1_000.0;

fn default_name() -> String {
    "cloud_monitoring".to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// Builds the mapping table for Cloud Monitoring container metrics rooted at `prefix`.
pub fn mapping_table(prefix: &str) -> MappingTable {
    MappingTable::new(prefix)
        .with_metric("uptime", MetricMapping::gauge("uptime").divided_by(MILLIS_PER_SECOND))
        .with_metric(
            "cpu/usage",
            MetricMapping::cumulative("cpu/usage_time").divided_by(NANOS_PER_SECOND),
        )
        .with_metric(
            "cpu/limit",
            MetricMapping::gauge("cpu/reserved_cores").divided_by(MILLICORES_PER_CORE),
        )
        // A node's limit is its capacity; node_allocatable is reported instead.
        .with_metric(
            "memory/limit",
            MetricMapping::gauge("memory/bytes_total").suppressed_for(ResourceType::Node),
        )
        .with_metric("memory/node_allocatable", MetricMapping::gauge("memory/bytes_total"))
        .with_metric("memory/bytes_used", MetricMapping::gauge("memory/bytes_used"))
        .with_metric(
            "memory/major_page_faults",
            MetricMapping::cumulative("memory/page_fault_count").with_extra_label("fault_type", "major"),
        )
        .with_metric(
            "memory/minor_page_faults",
            MetricMapping::cumulative("memory/page_fault_count").with_extra_label("fault_type", "minor"),
        )
        .with_metric("network/rx", MetricMapping::cumulative("network/received_bytes_count"))
        .with_metric("network/tx", MetricMapping::cumulative("network/sent_bytes_count"))
        .with_labeled_metric(
            "filesystem/usage",
            MetricMapping::gauge("disk/bytes_used").requiring_label(LABEL_RESOURCE_ID),
        )
        .with_labeled_metric(
            "filesystem/limit",
            MetricMapping::gauge("disk/bytes_total").requiring_label(LABEL_RESOURCE_ID),
        )
}

/// Returns the label rules for Cloud Monitoring container metrics.
pub fn label_rules() -> LabelRules {
    LabelRules::default()
        .with_resource_label(LABEL_NAMESPACE_NAME, "namespace_id")
        .with_resource_label(LABEL_POD_NAME, "pod_id")
        .with_resource_label(LABEL_CONTAINER_NAME, "container_name")
        .with_resource_label(LABEL_NODENAME, "instance_id")
        .with_sample_label(LABEL_RESOURCE_ID, "device_name")
}

/// Builds the Cloud Monitoring translator rooted at `prefix`.
pub fn translator(prefix: &str) -> TableTranslator {
    TableTranslator::new(mapping_table(prefix), label_rules())
}

/// Cloud Monitoring sink.
///
/// Exports container, pod and node metrics as Cloud Monitoring time series, posted as JSON to the configured
/// endpoint. Only the metrics in the container metric table are exported; everything else is dropped.
///
/// # Missing
///
/// - monitored resource descriptors (series carry their identity in flat labels only)
#[derive(Clone, Debug, Deserialize)]
pub struct CloudMonitoringConfiguration {
    /// Name of the sink.
    ///
    /// Defaults to `cloud_monitoring`.
    #[serde(default = "default_name")]
    name: String,

    /// External type prefix.
    ///
    /// Defaults to `container.googleapis.com/container`.
    #[serde(default = "default_prefix")]
    prefix: String,

    #[serde(flatten)]
    http: HttpTransportConfiguration,
}

impl CloudMonitoringConfiguration {
    /// Creates a new `CloudMonitoringConfiguration` with the default name and prefix.
    pub fn new(http: HttpTransportConfiguration) -> Self {
        Self {
            name: default_name(),
            prefix: default_prefix(),
            http,
        }
    }

    /// Returns the external type prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl SinkBuilder for CloudMonitoringConfiguration {
    fn sink_name(&self) -> &str {
        &self.name
    }

    async fn build(&self) -> Result<Arc<dyn Sink>, GenericError> {
        let transport = HttpTransport::from_configuration(&self.http)?;
        Ok(Arc::new(TranslatingSink::new(
            self.name.clone(),
            translator(&self.prefix),
            transport,
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use plume_core::{
        data_model::{
            labels::LABEL_METRIC_SET_TYPE, LabeledMetric, Labels, MetricBatch, MetricSet, MetricValue, TimeSeries,
            TypedValue,
        },
        translate::{translate_batch, Translator},
    };

    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn translate(
        labels: &Labels, name: &str, value: MetricValue, created: DateTime<Utc>, now: DateTime<Utc>,
    ) -> Option<TimeSeries> {
        translator(DEFAULT_PREFIX).translate_metric(now, labels, name, &value, created)
    }

    fn double(series: &TimeSeries) -> f64 {
        series.point().value().as_double().unwrap()
    }

    #[test]
    fn uptime_is_reported_in_seconds() {
        let now = Utc::now();
        let series = translate(&Labels::new(), "uptime", MetricValue::Int64(30_000), now, now).unwrap();

        assert_eq!(series.metric_type(), "container.googleapis.com/container/uptime");
        assert_eq!(series.points().len(), 1);
        assert_eq!(double(&series), 30.0);
    }

    #[test]
    fn cpu_usage_is_cumulative_seconds() {
        let now = Utc::now();
        let created = now - Duration::seconds(1);
        let value = MetricValue::Int64(3_600_000_000_000);
        let series = translate(&Labels::new(), "cpu/usage", value, created, now).unwrap();

        assert_eq!(series.metric_type(), "container.googleapis.com/container/cpu/usage_time");
        assert_eq!(double(&series), 3600.0);
        assert_eq!(series.point().interval().start_time(), created);
        assert_eq!(series.point().interval().end_time(), now);
    }

    #[test]
    fn cpu_limit_is_reported_in_cores() {
        let now = Utc::now();
        let created = now - Duration::seconds(1);
        let series = translate(&Labels::new(), "cpu/limit", MetricValue::Int64(2_000), created, now).unwrap();

        assert_eq!(series.metric_type(), "container.googleapis.com/container/cpu/reserved_cores");
        assert_eq!(double(&series), 2.0);
        assert_eq!(series.point().interval().start_time(), now);
    }

    #[test]
    fn memory_limit_is_suppressed_for_nodes_only() {
        let now = Utc::now();
        let node = labels(&[(LABEL_METRIC_SET_TYPE, "node")]);
        let pod = labels(&[(LABEL_METRIC_SET_TYPE, "pod")]);

        assert!(translate(&node, "memory/limit", MetricValue::Int64(2048), now, now).is_none());

        let series = translate(&pod, "memory/limit", MetricValue::Int64(2048), now, now).unwrap();
        assert_eq!(series.metric_type(), "container.googleapis.com/container/memory/bytes_total");
        assert_eq!(series.point().value(), &TypedValue::Int64(2048));

        let series = translate(&node, "memory/node_allocatable", MetricValue::Int64(2048), now, now).unwrap();
        assert_eq!(series.metric_type(), "container.googleapis.com/container/memory/bytes_total");
        assert_eq!(series.point().value(), &TypedValue::Int64(2048));
    }

    #[test]
    fn page_faults_carry_fault_type() {
        let now = Utc::now();
        let created = now - Duration::minutes(5);

        let major = translate(&Labels::new(), "memory/major_page_faults", MetricValue::Int64(20), created, now);
        let major = major.unwrap();
        assert_eq!(major.metric_type(), "container.googleapis.com/container/memory/page_fault_count");
        assert_eq!(major.label("fault_type"), Some("major"));
        assert_eq!(major.point().value(), &TypedValue::Int64(20));
        assert_eq!(major.point().interval().start_time(), created);

        let minor = translate(&Labels::new(), "memory/minor_page_faults", MetricValue::Int64(42), created, now);
        let minor = minor.unwrap();
        assert_eq!(minor.label("fault_type"), Some("minor"));
        assert_eq!(minor.point().value(), &TypedValue::Int64(42));
    }

    #[test]
    fn filesystem_usage_is_keyed_by_device() {
        let now = Utc::now();
        let metric = LabeledMetric::new("filesystem/usage", MetricValue::Int64(10_000))
            .with_label(LABEL_RESOURCE_ID, "/dev/sda1");

        let series = translator(DEFAULT_PREFIX)
            .translate_labeled_metric(now, &Labels::new(), &metric, now)
            .unwrap();
        assert_eq!(series.metric_type(), "container.googleapis.com/container/disk/bytes_used");
        assert_eq!(series.point().value(), &TypedValue::Int64(10_000));
        assert_eq!(series.label("device_name"), Some("/dev/sda1"));
    }

    #[test]
    fn network_counters_are_cumulative() {
        let now = Utc::now();
        let created = now - Duration::hours(2);

        let rx = translate(&Labels::new(), "network/rx", MetricValue::Int64(4096), created, now).unwrap();
        assert_eq!(rx.metric_type(), "container.googleapis.com/container/network/received_bytes_count");
        assert_eq!(rx.point().interval().start_time(), created);

        let tx = translate(&Labels::new(), "network/tx", MetricValue::Int64(512), created, now).unwrap();
        assert_eq!(tx.metric_type(), "container.googleapis.com/container/network/sent_bytes_count");
    }

    #[test]
    fn resource_labels_are_renamed() {
        let now = Utc::now();
        let container = labels(&[
            (LABEL_METRIC_SET_TYPE, "pod_container"),
            (LABEL_NAMESPACE_NAME, "default"),
            (LABEL_POD_NAME, "web-0"),
            (LABEL_CONTAINER_NAME, "nginx"),
            (LABEL_NODENAME, "node-1"),
        ]);

        let series = translate(&container, "memory/bytes_used", MetricValue::Int64(1), now, now).unwrap();
        let expected = labels(&[
            ("namespace_id", "default"),
            ("pod_id", "web-0"),
            ("container_name", "nginx"),
            ("instance_id", "node-1"),
        ]);
        assert_eq!(series.labels(), &expected);
    }

    #[test]
    fn unknown_metric_is_absent() {
        let now = Utc::now();
        assert!(translate(&Labels::new(), "cpu/request", MetricValue::Int64(1), now, now).is_none());
        assert!(translate(&Labels::new(), "filesystem/usage", MetricValue::Int64(1), now, now).is_none());
    }

    #[test]
    fn translation_is_idempotent() {
        let now = Utc::now();
        let created = now - Duration::minutes(1);
        let set = MetricSet::builder(created, now)
            .with_label(LABEL_METRIC_SET_TYPE, "pod")
            .with_label(LABEL_POD_NAME, "web-0")
            .with_metric("cpu/usage", 1_000_000_000_i64)
            .with_metric("memory/limit", 2048_i64)
            .with_metric("uptime", MetricValue::Float(1500.0))
            .with_labeled_metric(
                LabeledMetric::new("filesystem/limit", MetricValue::Int64(1 << 30)).with_label(LABEL_RESOURCE_ID, "/"),
            )
            .build()
            .unwrap();
        let batch = MetricBatch::new(now).with_metric_set("namespace:default/pod:web-0", set);
        let translator = translator(DEFAULT_PREFIX);

        let first = translate_batch(&translator, &batch);
        let second = translate_batch(&translator, &batch);
        assert_eq!(first.series, second.series);
        assert_eq!(first.series.len(), 4);
        assert_eq!(
            serde_json::to_string(&first.series).unwrap(),
            serde_json::to_string(&second.series).unwrap()
        );
    }

    #[tokio::test]
    async fn builds_from_configuration() {
        let config: CloudMonitoringConfiguration = serde_json::from_value(serde_json::json!({
            "endpoint": "http://localhost:9/v3/timeSeries",
            "max_series_per_request": 50,
        }))
        .unwrap();
        assert_eq!(config.sink_name(), "cloud_monitoring");
        assert_eq!(config.prefix(), DEFAULT_PREFIX);

        let sink = config.build().await.unwrap();
        assert_eq!(sink.name(), "cloud_monitoring");
    }
}
