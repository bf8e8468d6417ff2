//! Error types for landsnap

use thiserror::Error;

/// Result type alias for landsnap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, rendering, uploading or polling
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or fetch an image source
    #[error("Failed to load image: {0}")]
    LoadError(String),

    /// Source bytes could not be decoded as an image
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    /// Failed to produce or write rendered output
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Transport failure or non-success HTTP status
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The server answered with a body we cannot interpret
    #[error("Unexpected response: {0}")]
    ProtocolError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Error::Io(e),
            other => Error::DecodeError(other.to_string()),
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::NetworkError(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Error::ProtocolError(err.to_string())
        } else {
            Error::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ProtocolError(err.to_string())
    }
}
