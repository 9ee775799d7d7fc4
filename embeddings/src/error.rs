//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Provider did not answer within the configured deadline.
    #[error("embedding provider timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The provider could not produce an embedding. Callers degrade
    /// rather than abort on this error.
    #[error("embedding unavailable: {0}")]
    Unavailable(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether this error came from the provider being unreachable, slow or
    /// misbehaving, as opposed to a local configuration problem.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ApiRequest(_)
                | Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::Http(_)
                | Self::Unavailable(_)
        )
    }
}
