//! API server.

use std::{future::Future, net::SocketAddr};

use axum::Router;
use plume_api::APIHandler;
use plume_error::{ErrorContext as _, GenericError};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info, Instrument as _};

/// An API builder.
///
/// `APIBuilder` provides a simple and ergonomic builder pattern for constructing an API server from multiple handlers.
/// This allows composing portions of an API from individual building blocks.
///
/// ## Missing
///
/// - TLS support
/// - API-wide authentication support (can be added at the per-handler level)
#[derive(Default)]
pub struct APIBuilder {
    router: Router,
}

impl APIBuilder {
    /// Create a new `APIBuilder` with an empty router.
    ///
    /// Any route that isn't explicitly handled returns a 404 Not Found response.
    pub fn new() -> Self {
        Self { router: Router::new() }
    }

    /// Adds the given handler to this builder.
    ///
    /// The initial state and routes provided by the handler will be merged into this builder.
    pub fn with_handler<H>(mut self, handler: H) -> Self
    where
        H: APIHandler,
    {
        let handler_router = handler.generate_routes();
        let handler_state = handler.generate_initial_state();
        self.router = self.router.merge(handler_router.with_state(handler_state));

        self
    }

    /// Serves the API on the given TCP address until `shutdown` resolves.
    ///
    /// Returns the bound address once the listener is ready, along with the handle of the background task serving
    /// connections. Shutdown stops accepting new connections and waits for in-flight requests to finish, after which
    /// the task completes.
    ///
    /// ## Errors
    ///
    /// If the server fails to bind to the address, an error will be returned.
    pub async fn serve<F>(
        self, listen_address: SocketAddr, shutdown: F,
    ) -> Result<(SocketAddr, JoinHandle<()>), GenericError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(listen_address)
            .await
            .with_error_context(|| format!("Failed to bind API listener to {}.", listen_address))?;
        let local_addr = listener.local_addr()?;

        info!(listen_address = %local_addr, "Serving API.");

        let server = async move {
            if let Err(e) = axum::serve(listener, self.router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "Failed to serve API connections.");
            }
        };

        Ok((local_addr, tokio::spawn(server.in_current_span())))
    }
}
