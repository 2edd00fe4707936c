//! High-level application primitives.
//!
//! This crate provides common primitives necessary for bootstrapping an application prior to running, such as
//! initializing logging and serving the HTTP API.
#![deny(missing_docs)]

#[cfg(feature = "api")]
pub mod api;

#[cfg(feature = "logging")]
pub mod logging;

/// Common imports.
pub mod prelude {
    #[cfg(feature = "logging")]
    pub use super::logging::{fatal_and_exit, initialize_logging};
}
