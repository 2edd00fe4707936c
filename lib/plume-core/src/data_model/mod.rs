//! The internal metric model and the external time-series model it is translated into.

mod descriptors;
pub use self::descriptors::{DescriptorRegistry, MetricDescriptor, MetricType, Units};

pub mod labels;

mod metric_set;
pub use self::metric_set::{
    resource_type_of, LabeledMetric, Labels, MetricBatch, MetricSet, MetricSetBuilder, ModelError,
};

mod time_series;
pub use self::time_series::{Point, TimeInterval, TimeSeries, TypedValue};

mod value;
pub use self::value::{MetricValue, ValueType};
