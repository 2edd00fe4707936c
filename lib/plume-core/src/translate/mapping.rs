use std::collections::HashMap;

use crate::data_model::{labels::ResourceType, resource_type_of, Labels, MetricType, MetricValue, TypedValue};

/// How a raw sample is converted into the value a backend expects.
///
/// Conversion factors are fixed per metric name, never inferred from the sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueTransform {
    /// Keep the magnitude and representation: integers stay integers, floats become doubles.
    Identity,

    /// Divide by a fixed factor, always producing a double (for example nanoseconds to seconds).
    Divide(f64),
}

impl ValueTransform {
    /// Applies the transform to a sample.
    ///
    /// Returns `None` if the result is not a finite number, as NaN and infinities have no wire representation.
    pub fn apply(&self, value: &MetricValue) -> Option<TypedValue> {
        let value = match (self, value) {
            (Self::Identity, MetricValue::Int64(v)) => return Some(TypedValue::Int64(*v)),
            (Self::Identity, MetricValue::Float(v)) => *v,
            (Self::Divide(divisor), value) => value.as_f64() / divisor,
        };
        value.is_finite().then_some(TypedValue::Double(value))
    }
}

/// The translation rule for one internal metric name.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricMapping {
    external_suffix: String,
    kind: MetricType,
    transform: ValueTransform,
    suppressed_for: Vec<ResourceType>,
    extra_labels: Labels,
    required_labels: Vec<String>,
}

impl MetricMapping {
    fn new(external_suffix: &str, kind: MetricType) -> Self {
        Self {
            external_suffix: external_suffix.trim_matches('/').to_string(),
            kind,
            transform: ValueTransform::Identity,
            suppressed_for: Vec::new(),
            extra_labels: Labels::new(),
            required_labels: Vec::new(),
        }
    }

    /// Creates a mapping for a point-in-time metric, exported with a zero-length interval at the sample time.
    pub fn gauge(external_suffix: &str) -> Self {
        Self::new(external_suffix, MetricType::Gauge)
    }

    /// Creates a mapping for a cumulative metric, exported over `[create_time, timestamp]`.
    pub fn cumulative(external_suffix: &str) -> Self {
        Self::new(external_suffix, MetricType::Cumulative)
    }

    /// Divides raw samples by `divisor`, exporting doubles.
    pub fn divided_by(mut self, divisor: f64) -> Self {
        self.transform = ValueTransform::Divide(divisor);
        self
    }

    /// Drops samples from resources of the given type.
    pub fn suppressed_for(mut self, resource_type: ResourceType) -> Self {
        self.suppressed_for.push(resource_type);
        self
    }

    /// Adds a fixed label to every exported series.
    pub fn with_extra_label(mut self, key: &str, value: &str) -> Self {
        self.extra_labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Drops labeled samples that do not carry the given label.
    pub fn requiring_label(mut self, key: &str) -> Self {
        self.required_labels.push(key.to_string());
        self
    }

    /// Returns the external metric suffix, relative to the table prefix.
    pub fn external_suffix(&self) -> &str {
        &self.external_suffix
    }

    /// Returns the semantic kind the metric is exported as.
    pub fn kind(&self) -> MetricType {
        self.kind
    }

    /// Returns the value transform.
    pub fn transform(&self) -> ValueTransform {
        self.transform
    }

    /// Returns the fixed labels added to every exported series.
    pub fn extra_labels(&self) -> &Labels {
        &self.extra_labels
    }

    /// Returns `true` if samples from a resource with the given identity labels must not be exported.
    pub fn is_suppressed(&self, resource_labels: &Labels) -> bool {
        match resource_type_of(resource_labels) {
            Some(resource_type) => self.suppressed_for.contains(&resource_type),
            None => false,
        }
    }

    /// Returns `true` if a labeled sample carries every label this mapping requires.
    pub fn has_required_labels(&self, sample_labels: &Labels) -> bool {
        self.required_labels.iter().all(|key| sample_labels.contains_key(key))
    }
}

/// The complete set of translation rules for one backend.
///
/// Scalar and labeled metrics are looked up separately: a name mapped as labeled never matches a scalar sample, and
/// the other way around.
#[derive(Clone, Debug)]
pub struct MappingTable {
    prefix: String,
    scalar: HashMap<String, MetricMapping>,
    labeled: HashMap<String, MetricMapping>,
}

impl MappingTable {
    /// Creates an empty table whose external types are rooted at `prefix`.
    pub fn new<P>(prefix: P) -> Self
    where
        P: Into<String>,
    {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
            scalar: HashMap::new(),
            labeled: HashMap::new(),
        }
    }

    /// Adds the rule for a scalar metric.
    pub fn with_metric(mut self, name: &str, mapping: MetricMapping) -> Self {
        self.scalar.insert(name.to_string(), mapping);
        self
    }

    /// Adds the rule for a labeled metric.
    pub fn with_labeled_metric(mut self, name: &str, mapping: MetricMapping) -> Self {
        self.labeled.insert(name.to_string(), mapping);
        self
    }

    /// Returns the external type prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Gets the rule for a scalar metric.
    pub fn scalar(&self, name: &str) -> Option<&MetricMapping> {
        self.scalar.get(name)
    }

    /// Gets the rule for a labeled metric.
    pub fn labeled(&self, name: &str) -> Option<&MetricMapping> {
        self.labeled.get(name)
    }

    /// Returns the full external type for a rule in this table.
    pub fn external_type(&self, mapping: &MetricMapping) -> String {
        format!("{}/{}", self.prefix, mapping.external_suffix)
    }

    /// Returns the number of rules, scalar and labeled.
    pub fn len(&self) -> usize {
        self.scalar.len() + self.labeled.len()
    }

    /// Returns `true` if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.scalar.is_empty() && self.labeled.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::labels::LABEL_METRIC_SET_TYPE;

    fn labels_of_type(ty: &str) -> Labels {
        let mut labels = Labels::new();
        labels.insert(LABEL_METRIC_SET_TYPE.to_string(), ty.to_string());
        labels
    }

    #[test]
    fn divide_always_yields_double() {
        let transform = ValueTransform::Divide(1e9);
        assert_eq!(transform.apply(&MetricValue::Int64(3_600_000_000_000)), Some(TypedValue::Double(3600.0)));
        assert_eq!(transform.apply(&MetricValue::Float(5e8)), Some(TypedValue::Double(0.5)));
    }

    #[test]
    fn non_finite_results_have_no_value() {
        assert_eq!(ValueTransform::Identity.apply(&MetricValue::Float(f64::NAN)), None);
        assert_eq!(ValueTransform::Identity.apply(&MetricValue::Float(f64::INFINITY)), None);
        assert_eq!(ValueTransform::Divide(1e9).apply(&MetricValue::Float(f64::NEG_INFINITY)), None);
        assert_eq!(ValueTransform::Divide(0.0).apply(&MetricValue::Int64(5)), None);
    }

    #[test]
    fn identity_keeps_representation() {
        assert_eq!(ValueTransform::Identity.apply(&MetricValue::Int64(42)), Some(TypedValue::Int64(42)));
        assert_eq!(ValueTransform::Identity.apply(&MetricValue::Float(4.2)), Some(TypedValue::Double(4.2)));
    }

    #[test]
    fn suppression_matches_resource_type_label() {
        let mapping = MetricMapping::gauge("memory/bytes_total").suppressed_for(ResourceType::Node);

        assert!(mapping.is_suppressed(&labels_of_type("Node")));
        assert!(mapping.is_suppressed(&labels_of_type("node")));
        assert!(!mapping.is_suppressed(&labels_of_type("pod")));
        assert!(!mapping.is_suppressed(&Labels::new()));
    }

    #[test]
    fn scalar_and_labeled_rules_are_separate() {
        let table = MappingTable::new("vendor.example.com/container/")
            .with_metric("uptime", MetricMapping::gauge("uptime"))
            .with_labeled_metric("filesystem/usage", MetricMapping::gauge("/disk/bytes_used"));

        assert!(table.scalar("filesystem/usage").is_none());
        assert!(table.labeled("uptime").is_none());

        let mapping = table.labeled("filesystem/usage").unwrap();
        assert_eq!(table.external_type(mapping), "vendor.example.com/container/disk/bytes_used");
        assert_eq!(table.len(), 2);
    }
}
