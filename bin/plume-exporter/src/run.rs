use std::{future::Future, sync::Arc};

use plume_app::api::APIBuilder;
use plume_components::{api::ModelApiHandler, sinks::build_sinks, sources::file::FileMetricSource};
use plume_core::{
    data_model::DescriptorRegistry, scheduler::ExportScheduler, sources::SnapshotStore, task::spawn_traced,
};
use plume_error::{ErrorContext as _, GenericError};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::ExporterConfiguration;

fn shutdown_signal(mut rx: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = rx.wait_for(|stopping| *stopping).await;
    }
}

/// Runs the exporter until interrupted.
pub async fn run(config: ExporterConfiguration) -> Result<(), GenericError> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        process_id = std::process::id(),
        "Plume exporter starting..."
    );

    let sinks = build_sinks(config.sinks()).await?;
    if sinks.is_empty() {
        warn!("No sinks configured. Export cycles will only be logged.");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let store = SnapshotStore::new();

    let source = FileMetricSource::from_configuration(config.source());
    let refresher = spawn_traced(source.refresh_into(
        store.clone(),
        config.source().refresh_interval(),
        shutdown_signal(shutdown_rx.clone()),
    ));

    let api_server = if config.api_enabled() {
        let handler = ModelApiHandler::new(store.clone(), Arc::new(DescriptorRegistry::standard()));
        let (_, server) = APIBuilder::new()
            .with_handler(handler)
            .serve(config.api_listen_address(), shutdown_signal(shutdown_rx.clone()))
            .await?;
        Some(server)
    } else {
        info!("Model API disabled.");
        None
    };

    let mut scheduler = ExportScheduler::new(*config.scheduler(), store);
    for sink in sinks {
        scheduler.add_sink(sink);
    }
    let scheduler = spawn_traced(scheduler.run(shutdown_signal(shutdown_rx)));

    tokio::signal::ctrl_c()
        .await
        .error_context("Failed to listen for interrupt signal.")?;
    info!("Received SIGINT, shutting down...");

    // Receivers may already be gone if a task ended early.
    let _ = shutdown_tx.send(true);
    scheduler.await.error_context("Export scheduler task failed.")?;
    refresher.await.error_context("Metric source task failed.")?;
    if let Some(server) = api_server {
        server.await.error_context("Model API task failed.")?;
    }

    Ok(())
}

/// Validates the configuration by building every sink it declares.
pub async fn check_config(config: ExporterConfiguration) -> Result<(), GenericError> {
    let sinks = build_sinks(config.sinks()).await?;

    info!(
        interval_secs = config.scheduler().interval().as_secs(),
        timeout_secs = config.scheduler().timeout().as_secs(),
        source = %config.source().path().display(),
        api_enabled = config.api_enabled(),
        api_listen_address = %config.api_listen_address(),
        sinks = sinks.len(),
        "Configuration loaded."
    );
    for sink in &sinks {
        info!(sink = sink.name(), "Sink ready.");
    }

    Ok(())
}
