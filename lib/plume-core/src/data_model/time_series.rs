use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use super::Labels;

/// The value of an exported point.
///
/// Backends accept either an integer or a double per point, never both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TypedValue {
    /// A 64-bit integer value.
    Int64(i64),

    /// A double-precision value.
    Double(f64),
}

impl TypedValue {
    /// Returns the integer value, if this is an integer.
    pub const fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            Self::Double(_) => None,
        }
    }

    /// Returns the double value, if this is a double.
    pub const fn as_double(&self) -> Option<f64> {
        match self {
            Self::Int64(_) => None,
            Self::Double(v) => Some(*v),
        }
    }
}

// Integers are written as strings, following the JSON mapping of 64-bit integers used by the backends.
impl Serialize for TypedValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap as _;

        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Int64(v) => map.serialize_entry("int64Value", &v.to_string())?,
            Self::Double(v) => map.serialize_entry("doubleValue", v)?,
        }
        map.end()
    }
}

/// The time range a point describes.
///
/// Gauges use a zero-length interval at the sample time; cumulative metrics span from the counter's epoch to the
/// sample time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInterval {
    #[serde(serialize_with = "serialize_rfc3339")]
    start_time: DateTime<Utc>,
    #[serde(serialize_with = "serialize_rfc3339")]
    end_time: DateTime<Utc>,
}

impl TimeInterval {
    /// Creates a zero-length interval at `at`.
    pub const fn instant(at: DateTime<Utc>) -> Self {
        Self {
            start_time: at,
            end_time: at,
        }
    }

    /// Creates an interval from `start` to `end`.
    ///
    /// Returns `None` if `start` is after `end`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self {
            start_time: start,
            end_time: end,
        })
    }

    /// Returns the start of the interval.
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the end of the interval.
    pub const fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }
}

fn serialize_rfc3339<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// A single exported point.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Point {
    interval: TimeInterval,
    value: TypedValue,
}

impl Point {
    /// Creates a new point.
    pub const fn new(interval: TimeInterval, value: TypedValue) -> Self {
        Self { interval, value }
    }

    /// Returns the interval of the point.
    pub const fn interval(&self) -> &TimeInterval {
        &self.interval
    }

    /// Returns the value of the point.
    pub const fn value(&self) -> &TypedValue {
        &self.value
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct MetricIdentity {
    #[serde(rename = "type")]
    metric_type: String,
    labels: Labels,
}

/// A time-series record in a backend's wire model.
///
/// Each record identifies a metric by its external type (`<vendor-prefix>/<resource>/<metric>`) and a flat label map,
/// and carries exactly one point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeries {
    metric: MetricIdentity,
    points: [Point; 1],
}

impl TimeSeries {
    /// Creates a new time series with a single point.
    pub fn new<T>(metric_type: T, labels: Labels, point: Point) -> Self
    where
        T: Into<String>,
    {
        Self {
            metric: MetricIdentity {
                metric_type: metric_type.into(),
                labels,
            },
            points: [point],
        }
    }

    /// Returns the external metric type.
    pub fn metric_type(&self) -> &str {
        &self.metric.metric_type
    }

    /// Returns the labels of the series.
    pub fn labels(&self) -> &Labels {
        &self.metric.labels
    }

    /// Returns the value of the given label, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metric.labels.get(key).map(String::as_str)
    }

    /// Returns the points of the series. There is always exactly one.
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Returns the single point of the series.
    pub fn point(&self) -> &Point {
        &self.points[0]
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use serde_json::json;

    use super::*;

    #[test]
    fn wire_format() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 9, 1, 0).unwrap();
        let mut labels = Labels::new();
        labels.insert("pod_id".to_string(), "web-0".to_string());

        let series = TimeSeries::new(
            "container.googleapis.com/container/cpu/usage_time",
            labels,
            Point::new(TimeInterval::between(start, end).unwrap(), TypedValue::Double(1.5)),
        );

        assert_eq!(
            serde_json::to_value(&series).unwrap(),
            json!({
                "metric": {
                    "type": "container.googleapis.com/container/cpu/usage_time",
                    "labels": {"pod_id": "web-0"}
                },
                "points": [{
                    "interval": {
                        "startTime": "2024-05-01T09:00:00.000000000Z",
                        "endTime": "2024-05-01T09:01:00.000000000Z"
                    },
                    "value": {"doubleValue": 1.5}
                }]
            })
        );
    }

    #[test]
    fn int64_values_are_strings_on_the_wire() {
        let value = serde_json::to_value(TypedValue::Int64(2048)).unwrap();
        assert_eq!(value, json!({"int64Value": "2048"}));
    }

    #[test]
    fn inverted_interval_is_rejected() {
        let now = Utc::now();
        assert!(TimeInterval::between(now, now - chrono::Duration::seconds(1)).is_none());
        assert_eq!(TimeInterval::instant(now).start_time(), TimeInterval::instant(now).end_time());
    }
}
