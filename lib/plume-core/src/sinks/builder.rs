use std::sync::Arc;

use async_trait::async_trait;
use plume_error::GenericError;

use super::Sink;

/// A sink builder.
///
/// Sink builders are responsible for creating instances of [`Sink`]s from their configuration. All sinks are built
/// once at startup and then owned by the export scheduler.
#[async_trait]
pub trait SinkBuilder {
    /// Returns the name the built sink will carry.
    fn sink_name(&self) -> &str;

    /// Builds an instance of the sink.
    ///
    /// ## Errors
    ///
    /// If the sink cannot be built for any reason, an error is returned.
    async fn build(&self) -> Result<Arc<dyn Sink>, GenericError>;
}
