use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};

use super::{
    labels::{ResourceType, LABEL_METRIC_SET_TYPE},
    MetricValue,
};

/// Label key/value pairs, kept sorted so iteration order is stable.
pub type Labels = BTreeMap<String, String>;

/// Errors produced when assembling metric sets.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ModelError {
    /// The creation time came after the collection timestamp.
    #[snafu(display("create time {} is after timestamp {}", create_time, timestamp))]
    InvertedInterval {
        /// Epoch of the set's cumulative counters.
        create_time: DateTime<Utc>,

        /// Collection time of the set.
        timestamp: DateTime<Utc>,
    },
}

/// A metric sample that is one of several for the same name on a resource, distinguished by its labels.
///
/// Filesystem usage is the typical case: a node reports one `filesystem/usage` sample per device, each carrying the
/// device in its `resource_id` label.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct LabeledMetric {
    name: String,
    value: MetricValue,
    #[serde(default)]
    labels: Labels,
}

impl LabeledMetric {
    /// Creates a new labeled metric with no labels.
    pub fn new<N>(name: N, value: MetricValue) -> Self
    where
        N: Into<String>,
    {
        Self {
            name: name.into(),
            value,
            labels: Labels::new(),
        }
    }

    /// Adds a label to this metric.
    pub fn with_label<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Returns the metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the sample.
    pub fn value(&self) -> &MetricValue {
        &self.value
    }

    /// Returns the labels distinguishing this sample.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Returns the value of the given label, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// One resource's bundle of metric samples for one collection instant.
///
/// `create_time` is the epoch of cumulative counters (or the sample time for gauges), and `timestamp` is when the
/// samples were collected. `create_time <= timestamp` always holds: it is checked when the set is built or
/// deserialized.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "RawMetricSet", into = "RawMetricSet")]
pub struct MetricSet {
    labels: Labels,
    metric_values: BTreeMap<String, MetricValue>,
    labeled_metrics: BTreeMap<String, Vec<LabeledMetric>>,
    create_time: DateTime<Utc>,
    timestamp: DateTime<Utc>,
}

impl MetricSet {
    /// Starts building a metric set covering `[create_time, timestamp]`.
    pub fn builder(create_time: DateTime<Utc>, timestamp: DateTime<Utc>) -> MetricSetBuilder {
        MetricSetBuilder {
            labels: Labels::new(),
            metric_values: BTreeMap::new(),
            labeled_metrics: Vec::new(),
            create_time,
            timestamp,
        }
    }

    /// Returns the resource-identity labels.
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Returns the value of the given resource-identity label, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Returns the resource type named by the `type` label, if present and recognized.
    pub fn resource_type(&self) -> Option<ResourceType> {
        resource_type_of(&self.labels)
    }

    /// Returns the scalar samples, keyed by metric name.
    pub fn metric_values(&self) -> &BTreeMap<String, MetricValue> {
        &self.metric_values
    }

    /// Returns the labeled samples, grouped by metric name.
    pub fn labeled_metrics(&self) -> &BTreeMap<String, Vec<LabeledMetric>> {
        &self.labeled_metrics
    }

    /// Returns the epoch of cumulative counters in this set.
    pub fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    /// Returns the collection time of this set.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the total number of samples, scalar and labeled.
    pub fn sample_count(&self) -> usize {
        self.metric_values.len() + self.labeled_metrics.values().map(Vec::len).sum::<usize>()
    }
}

/// Returns the resource type named by the `type` label of the given labels, if present and recognized.
pub fn resource_type_of(labels: &Labels) -> Option<ResourceType> {
    labels.get(LABEL_METRIC_SET_TYPE).and_then(|ty| ty.parse().ok())
}

/// Builder for [`MetricSet`].
pub struct MetricSetBuilder {
    labels: Labels,
    metric_values: BTreeMap<String, MetricValue>,
    labeled_metrics: Vec<LabeledMetric>,
    create_time: DateTime<Utc>,
    timestamp: DateTime<Utc>,
}

impl MetricSetBuilder {
    /// Adds a resource-identity label.
    pub fn with_label<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Sets the `type` label to the given resource type.
    pub fn with_resource_type(self, resource_type: ResourceType) -> Self {
        self.with_label(LABEL_METRIC_SET_TYPE, resource_type.as_str())
    }

    /// Adds a scalar sample, replacing any earlier sample with the same name.
    pub fn with_metric<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<MetricValue>,
    {
        self.metric_values.insert(name.into(), value.into());
        self
    }

    /// Adds a labeled sample, replacing any earlier sample with the same name and labels.
    pub fn with_labeled_metric(mut self, metric: LabeledMetric) -> Self {
        self.labeled_metrics.push(metric);
        self
    }

    /// Builds the metric set.
    ///
    /// # Errors
    ///
    /// If the creation time is after the collection timestamp, an error is returned.
    pub fn build(self) -> Result<MetricSet, ModelError> {
        ensure!(
            self.create_time <= self.timestamp,
            InvertedInterval {
                create_time: self.create_time,
                timestamp: self.timestamp,
            }
        );

        let mut labeled_metrics = BTreeMap::<String, Vec<LabeledMetric>>::new();
        for metric in self.labeled_metrics {
            let group = labeled_metrics.entry(metric.name.clone()).or_default();
            match group.iter_mut().find(|existing| existing.labels == metric.labels) {
                Some(existing) => *existing = metric,
                None => group.push(metric),
            }
        }

        Ok(MetricSet {
            labels: self.labels,
            metric_values: self.metric_values,
            labeled_metrics,
            create_time: self.create_time,
            timestamp: self.timestamp,
        })
    }
}

// Serialized form of a metric set: labeled metrics as a flat list, each carrying its own name.
#[derive(Deserialize, Serialize)]
struct RawMetricSet {
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    metric_values: BTreeMap<String, MetricValue>,
    #[serde(default)]
    labeled_metrics: Vec<LabeledMetric>,
    create_time: DateTime<Utc>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<RawMetricSet> for MetricSet {
    type Error = ModelError;

    fn try_from(raw: RawMetricSet) -> Result<Self, Self::Error> {
        let mut builder = MetricSet::builder(raw.create_time, raw.timestamp);
        builder.labels = raw.labels;
        builder.metric_values = raw.metric_values;
        builder.labeled_metrics = raw.labeled_metrics;
        builder.build()
    }
}

impl From<MetricSet> for RawMetricSet {
    fn from(set: MetricSet) -> Self {
        Self {
            labels: set.labels,
            metric_values: set.metric_values,
            labeled_metrics: set.labeled_metrics.into_values().flatten().collect(),
            create_time: set.create_time,
            timestamp: set.timestamp,
        }
    }
}

/// A snapshot of every resource's metric set at one collection instant.
///
/// The unit handed to sinks on each export cycle. Sets are keyed by a resource key such as
/// `namespace:kube-system/pod:dns`, so iteration order is stable.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct MetricBatch {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    metric_sets: BTreeMap<String, MetricSet>,
}

impl MetricBatch {
    /// Creates an empty batch collected at `timestamp`.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            metric_sets: BTreeMap::new(),
        }
    }

    /// Adds a metric set under the given resource key, replacing any earlier set with that key.
    pub fn with_metric_set<K>(mut self, key: K, metric_set: MetricSet) -> Self
    where
        K: Into<String>,
    {
        self.metric_sets.insert(key.into(), metric_set);
        self
    }

    /// Returns the collection time of the batch.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the metric sets, keyed by resource key.
    pub fn metric_sets(&self) -> &BTreeMap<String, MetricSet> {
        &self.metric_sets
    }

    /// Returns the number of metric sets.
    pub fn len(&self) -> usize {
        self.metric_sets.len()
    }

    /// Returns `true` if the batch has no metric sets.
    pub fn is_empty(&self) -> bool {
        self.metric_sets.is_empty()
    }
}
