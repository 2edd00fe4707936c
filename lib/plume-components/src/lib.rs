//! Sources, sinks and API handlers for the exporter.
#![deny(missing_docs)]

pub mod api;
pub mod sinks;
pub mod sources;
