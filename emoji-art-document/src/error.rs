//! Document controller error types.

use emoji_art_core::{ModelError, StorageError};
use thiserror::Error;

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors surfaced when opening or saving a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Persisted bytes are not a valid document.
    #[error("Failed to decode document: {0}")]
    Decode(#[from] ModelError),

    /// Reading or writing the backing store failed.
    #[error("Document storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from fetching background image bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP layer failed (connection, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned status {0}")]
    Status(u16),

    /// Reading a local file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The URL scheme cannot be fetched.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// A `data:` URL could not be parsed.
    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// The response exceeded the configured size limit.
    #[error("Image exceeds {limit} bytes")]
    TooLarge {
        /// The configured limit in bytes.
        limit: usize,
    },
}

/// Errors from decoding image bytes.
#[derive(Debug, Error)]
pub enum ImageDecodeError {
    /// No bytes were supplied.
    #[error("Image data is empty")]
    Empty,

    /// The bytes are not an image the decoder understands.
    #[error("Failed to decode image: {0}")]
    Decode(String),
}
