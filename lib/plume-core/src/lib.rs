//! Core primitives for exporting cluster metrics.
//!
//! The metric model, the translators that map it to backend time series, the sink abstraction, metric sources, and
//! the scheduler that drives periodic exports.

pub mod data_model;
pub mod scheduler;
pub mod sinks;
pub mod sources;
pub mod task;
pub mod translate;
