use std::fmt;

use serde::{Deserialize, Serialize};

/// The numeric representation of a metric value.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Signed 64-bit integer.
    Int64,

    /// Floating-point number.
    Float,
}

/// A single metric sample.
///
/// Exactly one representation is carried per value, so readers always branch on the variant rather than assuming a
/// particular field is populated.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    /// An integer sample.
    Int64(i64),

    /// A floating-point sample.
    Float(f64),
}

impl MetricValue {
    /// Returns the value type of this sample.
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::Int64(_) => ValueType::Int64,
            Self::Float(_) => ValueType::Float,
        }
    }

    /// Returns the sample as a double, widening integers.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int64(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}
