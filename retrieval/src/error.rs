//! Error types for the context retrieval engine.

use parley_embeddings::EmbeddingError;
use parley_store::StoreError;
use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the retrieval engine.
///
/// The read path never surfaces these to its caller; they are recorded as
/// [`Degradation`](crate::result::Degradation)s on the result instead. The
/// write path (embedding indexing) and configuration loading return them.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The embedding provider failed or timed out.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    /// The meeting has not ended, so its transcript is still growing.
    #[error("meeting still in progress: {0}")]
    MeetingInProgress(String),

    /// A store or registry call failed or timed out.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store call was rejected because of the caller's input.
    #[error("store error: {0}")]
    Store(StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for RetrievalError {
    fn from(err: StoreError) -> Self {
        if err.is_caller_error() {
            Self::Store(err)
        } else {
            Self::StoreUnavailable(err.to_string())
        }
    }
}
