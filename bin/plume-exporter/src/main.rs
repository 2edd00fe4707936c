//! Cluster metric exporter.
//!
//! Reads metric batches from a file, translates them for each configured sink, and exports them on a fixed interval.
//! A read-only model API exposes what the latest batch contains.

#![deny(missing_docs)]
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use plume_app::prelude::*;
use tracing::{error, info};

mod config;
use self::config::{load_configuration, ExporterConfiguration};

mod run;
use self::run::{check_config, run};

/// Cluster metric exporter.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Runs the exporter.
    Run(ConfigArgs),

    /// Validates the configuration and the sinks it declares, then exits.
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "/etc/plume/exporter.yaml")]
    config: PathBuf,
}

impl Action {
    fn config_path(&self) -> &PathBuf {
        match self {
            Self::Run(args) | Self::CheckConfig(args) => &args.config,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exporter_config = match load_configuration(cli.action.config_path())
        .and_then(|config| ExporterConfiguration::from_configuration(&config))
    {
        Ok(exporter_config) => exporter_config,
        Err(e) => {
            fatal_and_exit(format!("failed to load configuration: {:#}", e));
            return;
        }
    };

    if let Err(e) = initialize_logging(exporter_config.log_level(), exporter_config.log_format_json()) {
        fatal_and_exit(format!("failed to initialize logging: {}", e));
    }

    let result = match cli.action {
        Action::Run(_) => run(exporter_config).await.map(|()| "Plume exporter stopped."),
        Action::CheckConfig(_) => check_config(exporter_config)
            .await
            .map(|()| "Configuration is valid."),
    };

    match result {
        Ok(message) => info!("{}", message),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}
