use std::time::Duration;

use async_trait::async_trait;
use plume_core::{data_model::TimeSeries, sinks::Transport};
use plume_error::GenericError;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt as _, Snafu};
use tracing::debug;

// Per-request series limit of the time-series write API.
const DEFAULT_MAX_SERIES_PER_REQUEST: usize = 200;

const fn default_max_series_per_request() -> usize {
    DEFAULT_MAX_SERIES_PER_REQUEST
}

const fn default_request_timeout_secs() -> u64 {
    10
}

/// An HTTP transport error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum TransportError {
    /// The chunk size was configured as zero.
    #[snafu(display("max_series_per_request must be greater than zero"))]
    InvalidChunkSize,

    /// The HTTP client could not be created.
    #[snafu(display("failed to build HTTP client: {}", source))]
    BuildClient {
        /// Error source.
        source: reqwest::Error,
    },

    /// The payload could not be encoded.
    #[snafu(display("failed to encode request payload: {}", source))]
    Encode {
        /// Error source.
        source: serde_json::Error,
    },

    /// The request did not complete.
    #[snafu(display("request to {} failed: {}", endpoint, source))]
    Request {
        /// Endpoint the request was sent to.
        endpoint: String,

        /// Error source.
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[snafu(display("backend at {} rejected request with status {}: {}", endpoint, status, body))]
    Rejected {
        /// Endpoint the request was sent to.
        endpoint: String,

        /// Response status.
        status: StatusCode,

        /// Response body, if it could be read.
        body: String,
    },
}

/// HTTP transport configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct HttpTransportConfiguration {
    /// URL the time series are posted to.
    endpoint: String,

    /// Timeout for a single request, in seconds.
    ///
    /// Defaults to 10 seconds.
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,

    /// Maximum number of series per request.
    ///
    /// Larger payloads are split into several requests. Defaults to 200.
    #[serde(default = "default_max_series_per_request")]
    max_series_per_request: usize,

    /// Bearer token sent in the `Authorization` header, if any.
    #[serde(default)]
    bearer_token: Option<String>,
}

impl HttpTransportConfiguration {
    /// Creates a configuration posting to `endpoint` with default settings.
    pub fn new<E>(endpoint: E) -> Self
    where
        E: Into<String>,
    {
        Self {
            endpoint: endpoint.into(),
            request_timeout_secs: default_request_timeout_secs(),
            max_series_per_request: default_max_series_per_request(),
            bearer_token: None,
        }
    }

    /// Sets the maximum number of series per request.
    pub fn with_max_series_per_request(mut self, max_series_per_request: usize) -> Self {
        self.max_series_per_request = max_series_per_request;
        self
    }

    /// Sets the bearer token.
    pub fn with_bearer_token<T>(mut self, token: T) -> Self
    where
        T: Into<String>,
    {
        self.bearer_token = Some(token.into());
        self
    }

    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTimeSeriesRequest<'a> {
    time_series: &'a [TimeSeries],
}

/// Posts time series as JSON to an HTTP endpoint.
///
/// The body is `{"timeSeries": [...]}`. Payloads larger than the configured limit are split into several requests,
/// sent in order; the first failing request ends the send, so earlier chunks may already have been accepted.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    max_series_per_request: usize,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// Creates a new `HttpTransport` from the given configuration.
    ///
    /// # Errors
    ///
    /// If the chunk size is zero, or the HTTP client cannot be created, an error is returned.
    pub fn from_configuration(config: &HttpTransportConfiguration) -> Result<Self, TransportError> {
        ensure!(config.max_series_per_request > 0, InvalidChunkSize);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context(BuildClient)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_series_per_request: config.max_series_per_request,
            bearer_token: config.bearer_token.clone(),
        })
    }

    async fn send_chunk(&self, chunk: &[TimeSeries]) -> Result<(), TransportError> {
        let body = serde_json::to_vec(&CreateTimeSeriesRequest { time_series: chunk }).context(Encode)?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context(Request {
            endpoint: &self.endpoint,
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Rejected {
                endpoint: &self.endpoint,
                status,
                body,
            }
            .fail();
        }

        debug!(endpoint = %self.endpoint, series = chunk.len(), "Time series accepted.");
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, series: Vec<TimeSeries>) -> Result<(), GenericError> {
        for chunk in series.chunks(self.max_series_per_request) {
            self.send_chunk(chunk).await?;
        }

        Ok(())
    }
}
