use thiserror::Error;

/// Errors that can occur when interacting with upstream Steem nodes.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpstreamError {
    /// Request exceeded the configured timeout duration.
    #[error("Request timeout")]
    Timeout,

    /// Failed to establish a connection to the upstream endpoint.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP-level error occurred (non-2xx status code).
    ///
    /// First field is the HTTP status code, second is the error message.
    #[error("HTTP error: {0}")]
    HttpError(u16, String),

    /// JSON-RPC error object embedded in a single-call reply.
    ///
    /// First field is the RPC error code, second is the error message.
    #[error("RPC error {0}: {1}")]
    RpcError(i32, String),

    /// A member of an upstream batch reply carried an error object.
    #[error("Batch item error: {0}")]
    BatchItemError(String),

    /// Response from upstream could not be parsed or was malformed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No configured endpoint is eligible for the method.
    #[error("No endpoint available for method {0}")]
    NoEndpointAvailable(String),

    /// Outbound concurrency permit could not be acquired in time.
    #[error("Concurrency limit reached: {0}")]
    ConcurrencyLimit(String),
}

impl UpstreamError {
    /// Returns `true` if this error is transient and the request should be retried.
    ///
    /// Transient errors include:
    /// - Timeouts (network congestion, slow upstream)
    /// - Connection errors
    /// - HTTP 5xx server errors
    /// - HTTP 429 rate limiting
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::HttpError(status, _) => (500..=599).contains(status) || *status == 429,
            _ => false,
        }
    }

    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailed(_) => "connection",
            Self::HttpError(_, _) => "http",
            Self::RpcError(_, _) => "rpc",
            Self::BatchItemError(_) => "batch_item",
            Self::InvalidResponse(_) => "invalid_response",
            Self::NoEndpointAvailable(_) => "no_endpoint",
            Self::ConcurrencyLimit(_) => "concurrency_limit",
        }
    }
}
