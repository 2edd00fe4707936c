//! Static metric descriptors.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{labels::LABEL_RESOURCE_ID, ValueType};

/// Semantic kind of a metric.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// A point-in-time reading.
    Gauge,

    /// A monotonically increasing counter, meaningful as a magnitude since the metric set's creation time.
    Cumulative,
}

/// Unit of the raw values reported for a metric.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    /// A plain count.
    Count,

    /// Bytes.
    Bytes,

    /// Milliseconds.
    Milliseconds,

    /// Nanoseconds.
    Nanoseconds,

    /// Thousandths of a CPU core.
    Millicores,
}

/// Describes a metric known to the pipeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricDescriptor {
    name: &'static str,
    description: &'static str,
    metric_type: MetricType,
    value_type: ValueType,
    units: Units,
    labels: &'static [&'static str],
}

impl MetricDescriptor {
    /// Creates a descriptor for a metric that is singular per resource.
    pub const fn new(
        name: &'static str, description: &'static str, metric_type: MetricType, value_type: ValueType, units: Units,
    ) -> Self {
        Self {
            name,
            description,
            metric_type,
            value_type,
            units,
            labels: &[],
        }
    }

    /// Marks the metric as labeled, keyed by the given label names in addition to its resource.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Returns the metric name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the human-readable description.
    pub const fn description(&self) -> &'static str {
        self.description
    }

    /// Returns the semantic kind of the metric.
    pub const fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    /// Returns the value type of samples of this metric.
    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns the units of the raw samples.
    pub const fn units(&self) -> Units {
        self.units
    }

    /// Returns the label names that distinguish series of a labeled metric.
    pub const fn labels(&self) -> &'static [&'static str] {
        self.labels
    }

    /// Returns `true` if the metric is reported as labeled metrics rather than one value per resource.
    pub const fn is_labeled(&self) -> bool {
        !self.labels.is_empty()
    }
}

const RESOURCE_ID_LABELS: &[&str] = &[LABEL_RESOURCE_ID];

const STANDARD_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor::new(
        "uptime",
        "Number of milliseconds since the container was started",
        MetricType::Cumulative,
        ValueType::Int64,
        Units::Milliseconds,
    ),
    MetricDescriptor::new(
        "cpu/usage",
        "Cumulative CPU usage on all cores",
        MetricType::Cumulative,
        ValueType::Int64,
        Units::Nanoseconds,
    ),
    MetricDescriptor::new(
        "cpu/request",
        "CPU request (the guaranteed amount of resources) in millicores",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Millicores,
    ),
    MetricDescriptor::new(
        "cpu/limit",
        "CPU hard limit in millicores",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Millicores,
    ),
    MetricDescriptor::new(
        "cpu/node_capacity",
        "CPU capacity of a node",
        MetricType::Gauge,
        ValueType::Float,
        Units::Millicores,
    ),
    MetricDescriptor::new(
        "cpu/node_allocatable",
        "CPU allocatable of a node",
        MetricType::Gauge,
        ValueType::Float,
        Units::Millicores,
    ),
    MetricDescriptor::new(
        "memory/usage",
        "Total memory usage",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Bytes,
    ),
    MetricDescriptor::new(
        "memory/bytes_used",
        "Memory in use, excluding reclaimable page cache",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Bytes,
    ),
    MetricDescriptor::new(
        "memory/working_set",
        "Total working set usage; the working set is memory that is in use and not easily dropped by the kernel",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Bytes,
    ),
    MetricDescriptor::new(
        "memory/request",
        "Memory request (the guaranteed amount of resources) in bytes",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Bytes,
    ),
    MetricDescriptor::new(
        "memory/limit",
        "Memory hard limit in bytes",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Bytes,
    ),
    MetricDescriptor::new(
        "memory/node_capacity",
        "Memory capacity of a node",
        MetricType::Gauge,
        ValueType::Float,
        Units::Bytes,
    ),
    MetricDescriptor::new(
        "memory/node_allocatable",
        "Memory allocatable of a node",
        MetricType::Gauge,
        ValueType::Float,
        Units::Bytes,
    ),
    MetricDescriptor::new(
        "memory/page_faults",
        "Number of page faults",
        MetricType::Cumulative,
        ValueType::Int64,
        Units::Count,
    ),
    MetricDescriptor::new(
        "memory/major_page_faults",
        "Number of major page faults",
        MetricType::Cumulative,
        ValueType::Int64,
        Units::Count,
    ),
    MetricDescriptor::new(
        "memory/minor_page_faults",
        "Number of minor page faults",
        MetricType::Cumulative,
        ValueType::Int64,
        Units::Count,
    ),
    MetricDescriptor::new(
        "network/rx",
        "Cumulative number of bytes received over the network",
        MetricType::Cumulative,
        ValueType::Int64,
        Units::Bytes,
    ),
    MetricDescriptor::new(
        "network/tx",
        "Cumulative number of bytes sent over the network",
        MetricType::Cumulative,
        ValueType::Int64,
        Units::Bytes,
    ),
    MetricDescriptor::new(
        "network/rx_errors",
        "Cumulative number of errors while receiving over the network",
        MetricType::Cumulative,
        ValueType::Int64,
        Units::Count,
    ),
    MetricDescriptor::new(
        "network/tx_errors",
        "Cumulative number of errors while sending over the network",
        MetricType::Cumulative,
        ValueType::Int64,
        Units::Count,
    ),
    MetricDescriptor::new(
        "filesystem/usage",
        "Total number of bytes consumed on a filesystem",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Bytes,
    )
    .with_labels(RESOURCE_ID_LABELS),
    MetricDescriptor::new(
        "filesystem/limit",
        "The total size of filesystem in bytes",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Bytes,
    )
    .with_labels(RESOURCE_ID_LABELS),
    MetricDescriptor::new(
        "filesystem/available",
        "The number of available bytes remaining in the filesystem",
        MetricType::Gauge,
        ValueType::Int64,
        Units::Bytes,
    )
    .with_labels(RESOURCE_ID_LABELS),
];

/// The set of metrics known to the pipeline, keyed by name.
///
/// Built once at startup and never mutated afterwards; share it behind an `Arc` to read it from any number of tasks.
#[derive(Clone, Debug)]
pub struct DescriptorRegistry {
    descriptors: BTreeMap<&'static str, MetricDescriptor>,
}

impl DescriptorRegistry {
    /// Creates a registry containing the standard cluster metrics.
    pub fn standard() -> Self {
        Self::from_descriptors(STANDARD_METRICS.iter().cloned())
    }

    /// Creates a registry from the given descriptors.
    ///
    /// A descriptor whose name was already seen replaces the earlier one.
    pub fn from_descriptors<I>(descriptors: I) -> Self
    where
        I: IntoIterator<Item = MetricDescriptor>,
    {
        Self {
            descriptors: descriptors.into_iter().map(|d| (d.name(), d)).collect(),
        }
    }

    /// Gets the descriptor for the given metric name.
    pub fn get(&self, name: &str) -> Option<&MetricDescriptor> {
        self.descriptors.get(name)
    }

    /// Returns the names of all registered metrics, in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.keys().copied()
    }

    /// Returns the number of registered metrics.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if no metrics are registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for DescriptorRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
