//! Internal telemetry helpers.
//!
//! Plume reports on itself (export cycles, per-sink outcomes, translated series) through the `metrics` facade. This
//! crate provides a builder for registering those metrics with a consistent set of default tags.
#![deny(missing_docs)]

mod builder;
pub use self::builder::{MetricTag, MetricsBuilder};
