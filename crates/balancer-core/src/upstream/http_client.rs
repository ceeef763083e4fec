use reqwest::{Client, ClientBuilder};
use std::{sync::Arc, time::Duration};
use tokio::sync::Semaphore;

use crate::upstream::{retry::RetryPolicy, UpstreamError};

const MAX_ERROR_BODY_CHARS: usize = 256;

/// Configuration for HTTP client concurrency and timeout behavior.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent outbound requests
    pub concurrent_limit: usize,
    /// Permit acquisition timeout in milliseconds
    pub permit_timeout_ms: u64,
    /// TCP connect timeout in seconds
    pub connect_timeout_seconds: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { concurrent_limit: 1000, permit_timeout_ms: 5000, connect_timeout_seconds: 5 }
    }
}

/// Shared HTTP client for every upstream call, with semaphore-based
/// concurrency control and policy-driven retries.
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Creates a new HTTP client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, UpstreamError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Sanitizes network errors so upstream addresses do not leak to clients.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// Creates a new HTTP client with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, UpstreamError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(100)
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("steem-balancer/", env!("CARGO_PKG_VERSION")))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                UpstreamError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self {
            client,
            concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)),
            config,
        })
    }

    /// POSTs a JSON body to `url`, retrying transient failures according to `policy`.
    ///
    /// The body is a `Bytes` so each retry clones a reference count, not the payload.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::Timeout`] if permit acquisition or the request times out
    /// - [`UpstreamError::ConcurrencyLimit`] if the semaphore is closed
    /// - [`UpstreamError::HttpError`] for non-success HTTP status codes
    /// - [`UpstreamError::ConnectionFailed`] for network-related failures
    ///
    /// Transient errors are only returned once the policy's attempts are exhausted.
    pub async fn send_request(
        &self,
        url: &str,
        body: bytes::Bytes,
        timeout: Duration,
        policy: &RetryPolicy,
    ) -> Result<bytes::Bytes, UpstreamError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_once(url, body.clone(), timeout).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_transient() && policy.should_retry(attempts) => {
                    let delay = policy.delay_for(attempts);
                    tracing::debug!(
                        url = url,
                        attempt = attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if attempts > 1 {
                        tracing::warn!(url = url, attempts = attempts, error = %e, "upstream retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        body: bytes::Bytes,
        timeout: Duration,
    ) -> Result<bytes::Bytes, UpstreamError> {
        // Held until the response body is read.
        let _permit = tokio::time::timeout(
            Duration::from_millis(self.config.permit_timeout_ms),
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                url = url,
                available_permits = self.concurrent_limit.available_permits(),
                "http client semaphore acquisition timeout"
            );
            UpstreamError::Timeout
        })?
        .map_err(|_| UpstreamError::ConcurrencyLimit(url.to_string()))?;

        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e))?;

        let status = response.status();
        if status.is_success() {
            return response.bytes().await.map_err(|e| Self::classify_send_error(&e));
        }

        let raw_text = response.text().await.unwrap_or_default();
        tracing::trace!(url = url, status = status.as_u16(), "http request failed");
        Err(UpstreamError::HttpError(status.as_u16(), truncate_body(raw_text)))
    }

    fn classify_send_error(error: &reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::ConnectionFailed(Self::sanitize_network_error(error))
        }
    }

    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}

fn truncate_body(raw_text: String) -> String {
    match raw_text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}... (truncated)", &raw_text[..cut]),
        None => raw_text,
    }
}
