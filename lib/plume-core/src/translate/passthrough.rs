use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{build_point, Translator, ValueTransform};
use crate::data_model::{DescriptorRegistry, LabeledMetric, Labels, MetricValue, TimeSeries};

/// A translator that exports every registered metric under its own name.
///
/// The external type is `<prefix>/<metric name>`, values are exported unchanged, and the interval follows the
/// metric's descriptor: cumulative metrics span `[create_time, timestamp]`, gauges sit at `timestamp`. All resource
/// labels, and a labeled metric's own labels, are copied verbatim. Metrics missing from the registry are not exported.
#[derive(Clone, Debug)]
pub struct PassthroughTranslator {
    prefix: String,
    registry: Arc<DescriptorRegistry>,
}

impl PassthroughTranslator {
    /// Creates a new `PassthroughTranslator`.
    pub fn new<P>(prefix: P, registry: Arc<DescriptorRegistry>) -> Self
    where
        P: Into<String>,
    {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            registry,
        }
    }

    fn external_type(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }
}

impl Translator for PassthroughTranslator {
    fn translate_metric(
        &self, timestamp: DateTime<Utc>, labels: &Labels, name: &str, value: &MetricValue, create_time: DateTime<Utc>,
    ) -> Option<TimeSeries> {
        let descriptor = self.registry.get(name)?;
        if descriptor.is_labeled() {
            return None;
        }

        let point = build_point(
            descriptor.metric_type(),
            ValueTransform::Identity.apply(value)?,
            timestamp,
            create_time,
        )?;
        Some(TimeSeries::new(self.external_type(name), labels.clone(), point))
    }

    fn translate_labeled_metric(
        &self, timestamp: DateTime<Utc>, labels: &Labels, metric: &LabeledMetric, create_time: DateTime<Utc>,
    ) -> Option<TimeSeries> {
        let descriptor = self.registry.get(metric.name())?;
        if !descriptor.is_labeled() || !descriptor.labels().iter().all(|key| metric.labels().contains_key(*key)) {
            return None;
        }

        let point = build_point(
            descriptor.metric_type(),
            ValueTransform::Identity.apply(metric.value())?,
            timestamp,
            create_time,
        )?;

        let mut output_labels = labels.clone();
        output_labels.extend(metric.labels().iter().map(|(k, v)| (k.clone(), v.clone())));
        Some(TimeSeries::new(self.external_type(metric.name()), output_labels, point))
    }
}
