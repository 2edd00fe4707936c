//! JSON file metric source.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use plume_core::{
    data_model::MetricBatch,
    sources::{MetricSource, SnapshotStore},
};
use plume_error::{ErrorContext as _, GenericError};
use serde::Deserialize;
use tokio::{pin, select, time::interval};
use tracing::{debug, warn};

const fn default_refresh_interval_secs() -> u64 {
    10
}

/// File source configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct FileSourceConfiguration {
    /// Path to a JSON-encoded metric batch.
    path: PathBuf,

    /// How often the file is re-read, in seconds.
    ///
    /// Defaults to 10 seconds.
    #[serde(default = "default_refresh_interval_secs")]
    refresh_interval_secs: u64,
}

impl FileSourceConfiguration {
    /// Creates a configuration reading `path` with the default refresh interval.
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            path: path.into(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }

    /// Sets the refresh interval, in seconds.
    pub fn with_refresh_interval_secs(mut self, refresh_interval_secs: u64) -> Self {
        self.refresh_interval_secs = refresh_interval_secs;
        self
    }

    /// Returns the path of the batch file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns how often the file is re-read.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

/// Reads metric batches from a JSON file.
///
/// The file holds one serialized [`MetricBatch`]; whatever assembles metric sets writes it, and this source reads the
/// whole file on every pull. A file that is missing, malformed, or contains an inconsistent metric set is an error,
/// never a partial batch.
#[derive(Clone, Debug)]
pub struct FileMetricSource {
    path: PathBuf,
}

impl FileMetricSource {
    /// Creates a new `FileMetricSource` reading from `path`.
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { path: path.into() }
    }

    /// Creates a new `FileMetricSource` from the given configuration.
    pub fn from_configuration(config: &FileSourceConfiguration) -> Self {
        Self::new(config.path.clone())
    }

    fn parse(&self, contents: &[u8]) -> Result<MetricBatch, GenericError> {
        serde_json::from_slice::<MetricBatch>(contents)
            .with_error_context(|| format!("Failed to parse metric batch from '{}'.", self.path.display()))
    }

    /// Reads the batch without blocking the runtime.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or parsed, an error is returned.
    pub async fn load(&self) -> Result<MetricBatch, GenericError> {
        let contents = tokio::fs::read(&self.path)
            .await
            .with_error_context(|| format!("Failed to read metric batch file '{}'.", self.path.display()))?;
        self.parse(&contents)
    }

    /// Publishes the file's batch into `store` every `period` until `shutdown` resolves.
    ///
    /// The first read happens immediately. A failed read keeps the previously published batch.
    pub async fn refresh_into<F>(self, store: SnapshotStore, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(period);
        pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => match self.load().await {
                    Ok(batch) => {
                        debug!(metric_sets = batch.len(), timestamp = %batch.timestamp(), "Published metric batch.");
                        store.publish(batch);
                    }
                    Err(e) => warn!(error = %e, "Failed to refresh metric batch. Keeping previous snapshot."),
                },
            }
        }
    }
}

impl MetricSource for FileMetricSource {
    fn latest_batch(&self) -> Result<Arc<MetricBatch>, GenericError> {
        let contents = std::fs::read(&self.path)
            .with_error_context(|| format!("Failed to read metric batch file '{}'.", self.path.display()))?;
        self.parse(&contents).map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use tempfile::NamedTempFile;
    use tokio::sync::oneshot;

    use super::*;

    const BATCH: &str = r#"{
        "timestamp": "2026-01-01T00:01:00Z",
        "metric_sets": {
            "namespace:default/pod:web-0": {
                "labels": { "type": "pod", "namespace_name": "default", "pod_name": "web-0" },
                "metric_values": { "memory/limit": { "int64": 2048 }, "cpu/usage": { "int64": 1000 } },
                "labeled_metrics": [
                    { "name": "filesystem/usage", "value": { "int64": 10000 }, "labels": { "resource_id": "/" } }
                ],
                "create_time": "2026-01-01T00:00:00Z",
                "timestamp": "2026-01-01T00:01:00Z"
            }
        }
    }"#;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_batch_from_file() {
        let file = write_file(BATCH);
        let batch = FileMetricSource::new(file.path()).latest_batch().unwrap();

        assert_eq!(batch.len(), 1);
        let set = &batch.metric_sets()["namespace:default/pod:web-0"];
        assert_eq!(set.label("pod_name"), Some("web-0"));
        assert_eq!(set.labeled_metrics()["filesystem/usage"].len(), 1);
        assert_eq!(set.sample_count(), 3);
    }

    #[test]
    fn inverted_metric_set_is_rejected() {
        let inverted = BATCH.replace(
            "\"create_time\": \"2026-01-01T00:00:00Z\"",
            "\"create_time\": \"2026-01-02T00:00:00Z\"",
        );
        let file = write_file(&inverted);

        assert!(FileMetricSource::new(file.path()).latest_batch().is_err());
    }

    #[test]
    fn missing_file_names_path() {
        let err = FileMetricSource::new("/nonexistent/plume/batch.json")
            .latest_batch()
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/plume/batch.json"));
    }

    #[tokio::test]
    async fn refresh_publishes_into_store() {
        let file = write_file(BATCH);
        let store = SnapshotStore::new();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let source = FileMetricSource::new(file.path());
        let refresher = tokio::spawn(source.refresh_into(store.clone(), Duration::from_secs(60), async move {
            let _ = shutdown_rx.await;
        }));

        for _ in 0..100 {
            if !store.load().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        shutdown_tx.send(()).unwrap();
        refresher.await.unwrap();
        assert_eq!(store.load().len(), 1);
    }
}
