//! Error types for the tiered store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in the tiered store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No meeting with this id exists.
    #[error("meeting not found: {0}")]
    MeetingNotFound(String),

    /// An id that cannot be used as a storage key.
    #[error("invalid id: {0:?}")]
    InvalidId(String),

    /// An embedding batch does not match the meeting it is written to.
    #[error("invalid embedding batch for meeting {meeting_id}: {reason}")]
    InvalidEmbeddingBatch { meeting_id: String, reason: String },

    /// The backing storage could not be reached or failed mid-operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Storage operation on disk failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether the error was caused by the caller passing bad input rather
    /// than by the backend failing.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::MeetingNotFound(_) | Self::InvalidId(_) | Self::InvalidEmbeddingBatch { .. }
        )
    }
}

/// Disk-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create storage directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read a record file.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write a record file.
    #[error("failed to write file: {0}")]
    WriteFile(String),

    /// Failed to delete a record file.
    #[error("failed to delete file: {0}")]
    DeleteFile(String),
}
