use chrono::{DateTime, Utc};

use super::{build_point, MappingTable, MetricMapping, Translator};
use crate::data_model::{LabeledMetric, Labels, MetricValue, TimeSeries};

/// Which input labels are copied onto exported series, and under which keys.
///
/// Resource rules read the metric set's identity labels; sample rules read a labeled metric's own labels. A rule
/// whose source label is absent contributes nothing.
#[derive(Clone, Debug, Default)]
pub struct LabelRules {
    resource: Vec<(String, String)>,
    sample: Vec<(String, String)>,
}

impl LabelRules {
    /// Copies the resource label `source` to the output label `target`.
    pub fn with_resource_label(mut self, source: &str, target: &str) -> Self {
        self.resource.push((source.to_string(), target.to_string()));
        self
    }

    /// Copies the labeled-metric label `source` to the output label `target`.
    pub fn with_sample_label(mut self, source: &str, target: &str) -> Self {
        self.sample.push((source.to_string(), target.to_string()));
        self
    }

    fn copy_into(rules: &[(String, String)], from: &Labels, into: &mut Labels) {
        for (source, target) in rules {
            if let Some(value) = from.get(source) {
                into.insert(target.clone(), value.clone());
            }
        }
    }
}

/// A translator driven entirely by a [`MappingTable`] and [`LabelRules`].
///
/// Adding a metric or a backend means adding data to a table, not branches to the translator.
#[derive(Clone, Debug)]
pub struct TableTranslator {
    table: MappingTable,
    label_rules: LabelRules,
}

impl TableTranslator {
    /// Creates a new `TableTranslator`.
    pub fn new(table: MappingTable, label_rules: LabelRules) -> Self {
        Self { table, label_rules }
    }

    /// Returns the mapping table.
    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    fn build_series(
        &self, mapping: &MetricMapping, labels: Labels, value: &MetricValue, timestamp: DateTime<Utc>,
        create_time: DateTime<Utc>,
    ) -> Option<TimeSeries> {
        let point = build_point(mapping.kind(), mapping.transform().apply(value)?, timestamp, create_time)?;
        Some(TimeSeries::new(self.table.external_type(mapping), labels, point))
    }

    fn resource_labels(&self, mapping: &MetricMapping, resource_labels: &Labels) -> Labels {
        let mut labels = Labels::new();
        LabelRules::copy_into(&self.label_rules.resource, resource_labels, &mut labels);
        labels.extend(mapping.extra_labels().iter().map(|(k, v)| (k.clone(), v.clone())));
        labels
    }
}

impl Translator for TableTranslator {
    fn translate_metric(
        &self, timestamp: DateTime<Utc>, labels: &Labels, name: &str, value: &MetricValue, create_time: DateTime<Utc>,
    ) -> Option<TimeSeries> {
        let mapping = self.table.scalar(name)?;
        if mapping.is_suppressed(labels) {
            return None;
        }

        let output_labels = self.resource_labels(mapping, labels);
        self.build_series(mapping, output_labels, value, timestamp, create_time)
    }

    fn translate_labeled_metric(
        &self, timestamp: DateTime<Utc>, labels: &Labels, metric: &LabeledMetric, create_time: DateTime<Utc>,
    ) -> Option<TimeSeries> {
        let mapping = self.table.labeled(metric.name())?;
        if mapping.is_suppressed(labels) || !mapping.has_required_labels(metric.labels()) {
            return None;
        }

        let mut output_labels = self.resource_labels(mapping, labels);
        LabelRules::copy_into(&self.label_rules.sample, metric.labels(), &mut output_labels);
        self.build_series(mapping, output_labels, metric.value(), timestamp, create_time)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::data_model::{
        labels::{ResourceType, LABEL_METRIC_SET_TYPE, LABEL_POD_NAME, LABEL_RESOURCE_ID},
        TypedValue,
    };

    fn translator() -> TableTranslator {
        let table = MappingTable::new("example.com/pod")
            .with_metric(
                "memory/limit",
                MetricMapping::gauge("memory/bytes_total").suppressed_for(ResourceType::Node),
            )
            .with_metric(
                "memory/major_page_faults",
                MetricMapping::cumulative("memory/page_fault_count").with_extra_label("fault_type", "major"),
            )
            .with_labeled_metric(
                "filesystem/limit",
                MetricMapping::gauge("disk/bytes_total").requiring_label(LABEL_RESOURCE_ID),
            );
        let rules = LabelRules::default()
            .with_resource_label(LABEL_POD_NAME, "pod_id")
            .with_sample_label(LABEL_RESOURCE_ID, "device_name");

        TableTranslator::new(table, rules)
    }

    fn pod_labels() -> Labels {
        let mut labels = Labels::new();
        labels.insert(LABEL_METRIC_SET_TYPE.to_string(), "pod".to_string());
        labels.insert(LABEL_POD_NAME.to_string(), "web-0".to_string());
        labels
    }

    #[test]
    fn resource_and_extra_labels_are_merged() {
        let now = Utc::now();
        let series = translator()
            .translate_metric(
                now,
                &pod_labels(),
                "memory/major_page_faults",
                &MetricValue::Int64(20),
                now - Duration::hours(1),
            )
            .unwrap();

        assert_eq!(series.metric_type(), "example.com/pod/memory/page_fault_count");
        assert_eq!(series.label("pod_id"), Some("web-0"));
        assert_eq!(series.label("fault_type"), Some("major"));
        assert_eq!(series.label(LABEL_METRIC_SET_TYPE), None);
        assert_eq!(series.point().interval().start_time(), now - Duration::hours(1));
    }

    #[test]
    fn labeled_metric_requires_label_and_copies_it() {
        let now = Utc::now();
        let translator = translator();

        let with_id =
            LabeledMetric::new("filesystem/limit", MetricValue::Int64(500)).with_label(LABEL_RESOURCE_ID, "/");
        let series = translator
            .translate_labeled_metric(now, &pod_labels(), &with_id, now)
            .unwrap();
        assert_eq!(series.label("device_name"), Some("/"));
        assert_eq!(series.point().value(), &TypedValue::Int64(500));

        let without_id = LabeledMetric::new("filesystem/limit", MetricValue::Int64(500));
        assert!(translator
            .translate_labeled_metric(now, &pod_labels(), &without_id, now)
            .is_none());
    }

    #[test]
    fn suppressed_and_unknown_are_absent() {
        let now = Utc::now();
        let translator = translator();

        let mut node_labels = Labels::new();
        node_labels.insert(LABEL_METRIC_SET_TYPE.to_string(), "Node".to_string());
        assert!(translator
            .translate_metric(now, &node_labels, "memory/limit", &MetricValue::Int64(2048), now)
            .is_none());
        assert!(translator
            .translate_metric(now, &pod_labels(), "memory/limit", &MetricValue::Int64(2048), now)
            .is_some());
        assert!(translator
            .translate_metric(now, &pod_labels(), "filesystem/limit", &MetricValue::Int64(1), now)
            .is_none());
    }

    #[test]
    fn non_finite_sample_is_absent() {
        let now = Utc::now();
        let translator = translator();

        for value in [f64::NAN, f64::INFINITY] {
            assert!(translator
                .translate_metric(now, &pod_labels(), "memory/limit", &MetricValue::Float(value), now)
                .is_none());
        }
    }

    #[test]
    fn inverted_interval_is_absent() {
        let now = Utc::now();
        let result = translator().translate_metric(
            now,
            &pod_labels(),
            "memory/limit",
            &MetricValue::Int64(1),
            now + Duration::seconds(1),
        );
        assert!(result.is_none());
    }
}
