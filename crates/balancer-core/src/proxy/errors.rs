use crate::{proxy::validation::ValidationError, upstream::errors::UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation error: {0}")]
    Validation(ValidationError),

    #[error("Batch of {size} calls exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Preserves concrete `UpstreamError` type for status mapping and metrics.
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for ProxyError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl ProxyError {
    /// Returns `true` when the client sent something we refuse to forward.
    ///
    /// Client errors map to HTTP 400, everything else to 502.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::Validation(_) | Self::BatchTooLarge { .. })
    }

    /// HTTP status code the boundary layer should answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            502
        }
    }
}
