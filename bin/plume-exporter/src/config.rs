use std::{
    net::{Ipv4Addr, SocketAddr},
    path::Path,
    str::FromStr as _,
    time::Duration,
};

use plume_components::{sinks::SinkConfiguration, sources::file::FileSourceConfiguration};
use plume_config::{ConfigurationLoader, GenericConfiguration};
use plume_core::scheduler::SchedulerConfiguration;
use plume_error::{generic_error, ErrorContext as _, GenericError};
use tracing::level_filters::LevelFilter;

const ENV_PREFIX: &str = "PLUME";
const DEFAULT_API_PORT: u16 = 8082;

/// Loads the configuration file at `path`, with `PLUME_`-prefixed environment variables layered on top.
///
/// Files ending in `.json` are read as JSON; anything else is read as YAML.
pub fn load_configuration(path: &Path) -> Result<GenericConfiguration, GenericError> {
    let loader = ConfigurationLoader::default();
    let loader = if path.extension().is_some_and(|ext| ext == "json") {
        loader.from_json(path)
    } else {
        loader.from_yaml(path)
    }
    .with_error_context(|| format!("Failed to load configuration file '{}'.", path.display()))?;

    Ok(loader.from_environment(ENV_PREFIX)?.into_generic())
}

/// Exporter configuration.
#[derive(Clone, Debug)]
pub struct ExporterConfiguration {
    scheduler: SchedulerConfiguration,
    api_enabled: bool,
    api_listen_address: SocketAddr,
    source: FileSourceConfiguration,
    sinks: Vec<SinkConfiguration>,
    log_level: Option<LevelFilter>,
    log_format_json: Option<bool>,
}

impl ExporterConfiguration {
    /// Creates a new `ExporterConfiguration` from the given configuration.
    ///
    /// Each key is queried individually so that nested keys can be overridden by flat environment variables, such as
    /// `PLUME_EXPORT_INTERVAL_SECS` for `export.interval_secs`.
    ///
    /// # Errors
    ///
    /// If a key holds a value of the wrong type, `source.path` is missing, or the export timeout is longer than
    /// the interval, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        let interval_secs = config.try_get_typed("export.interval_secs")?.unwrap_or(60);
        let timeout_secs = config.try_get_typed("export.timeout_secs")?.unwrap_or(20);
        let scheduler =
            SchedulerConfiguration::new(Duration::from_secs(interval_secs), Duration::from_secs(timeout_secs))
                .error_context("Invalid export schedule.")?;

        let mut source = FileSourceConfiguration::new(config.get_typed::<String>("source.path")?);
        if let Some(refresh_interval_secs) = config.try_get_typed("source.refresh_interval_secs")? {
            source = source.with_refresh_interval_secs(refresh_interval_secs);
        }

        let log_level = config
            .try_get_typed::<String>("log_level")?
            .map(|level| {
                LevelFilter::from_str(&level).map_err(|_| generic_error!("Invalid log level '{}'.", level))
            })
            .transpose()?;

        Ok(Self {
            scheduler,
            api_enabled: config.try_get_typed("api.enabled")?.unwrap_or(true),
            api_listen_address: config
                .try_get_typed("api.listen_address")?
                .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_API_PORT))),
            source,
            sinks: config.try_get_typed("sinks")?.unwrap_or_default(),
            log_level,
            log_format_json: config.try_get_typed("log_format_json")?,
        })
    }

    /// Returns the export schedule.
    pub fn scheduler(&self) -> &SchedulerConfiguration {
        &self.scheduler
    }

    /// Returns `true` if the model API should be served.
    pub const fn api_enabled(&self) -> bool {
        self.api_enabled
    }

    /// Returns the address the model API listens on.
    pub const fn api_listen_address(&self) -> SocketAddr {
        self.api_listen_address
    }

    /// Returns the metric source configuration.
    pub fn source(&self) -> &FileSourceConfiguration {
        &self.source
    }

    /// Returns the configured sinks, in declaration order.
    pub fn sinks(&self) -> &[SinkConfiguration] {
        &self.sinks
    }

    /// Returns the configured default log level, if any.
    pub const fn log_level(&self) -> Option<LevelFilter> {
        self.log_level
    }

    /// Returns whether JSON logging was explicitly configured.
    pub const fn log_format_json(&self) -> Option<bool> {
        self.log_format_json
    }
}
