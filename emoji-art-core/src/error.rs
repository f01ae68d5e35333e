//! Error types for model and storage operations.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while decoding or encoding a canvas document.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Document serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The persisted background could not be interpreted.
    #[error("Invalid background: {0}")]
    InvalidBackground(String),

    /// A persisted emoji id is outside the range ids are allocated from.
    #[error("Emoji id {0} exceeds {max}", max = crate::model::MAX_EMOJI_ID)]
    InvalidEmojiId(u64),
}

/// Result type for key-value storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading or writing persisted values.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred during persistence.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded for storage.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
