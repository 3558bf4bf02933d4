//! HTTP transport for submitting queries to a mirror.
//!
//! [`Transport`] is the seam between the retry engine and the network. The
//! production [`HttpTransport`] POSTs the query as a URL-encoded `data` field
//! and reports the raw status, `Retry-After` header, and body; classifying
//! that response is left to [`crate::classify_response`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, RETRY_AFTER};
use thiserror::Error;

use crate::config::DEFAULT_USER_AGENT;
use crate::mirror::Mirror;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Raw response from one mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Retry-After` header value, when present and valid ASCII.
    pub retry_after: Option<String>,
    /// Response body.
    pub body: String,
}

impl UpstreamResponse {
    /// Build a response with no `Retry-After` header.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }

    /// Attach a raw `Retry-After` header value.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: impl Into<String>) -> Self {
        self.retry_after = Some(retry_after.into());
        self
    }
}

/// Failures raised before a complete response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The per-attempt timeout elapsed.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// Mirror URL.
        url: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },
    /// Connection, TLS, or body transfer failure.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Mirror URL.
        url: String,
        /// Transport diagnostic.
        message: String,
    },
}

impl TransportError {
    /// Whether this failure was a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Submits a query to one mirror.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `query` to `mirror` and return the raw response.
    ///
    /// Non-2xx statuses are returned as responses, not errors.
    async fn send(&self, mirror: &Mirror, query: &str) -> Result<UpstreamResponse, TransportError>;
}

/// Error type for [`HttpTransport`] construction failures.
#[derive(Debug, Error)]
pub enum TransportBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Descriptive client identifier sent as `User-Agent`.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpTransportConfig {
    /// Set the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a transport with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self, TransportBuildError> {
        Self::with_config(HttpTransportConfig::default())
    }

    /// Create a transport with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_config(config: HttpTransportConfig) -> Result<Self, TransportBuildError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(TransportBuildError::HttpClient)?;
        Ok(Self { client, config })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, mirror: &Mirror) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout {
                url: mirror.to_string(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }
        TransportError::Network {
            url: mirror.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, mirror: &Mirror, query: &str) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .client
            .post(mirror.url().clone())
            .header(ACCEPT_LANGUAGE, "en")
            .form(&[("data", query)])
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, mirror))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response
            .text()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, mirror))?;

        Ok(UpstreamResponse {
            status,
            retry_after,
            body,
        })
    }
}
