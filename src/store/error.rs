use std::error::Error;

use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by shared store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path could not be parsed or contains a forbidden segment.
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
    /// A mutation does not fit the value currently stored at its path.
    #[error("type mismatch at `{path}`: {reason}")]
    TypeMismatch { path: String, reason: String },
    /// The backend cannot accept writes or subscriptions.
    #[error("store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Same as [`StoreError::unavailable`] but keeping the underlying cause.
    pub fn unavailable_with(
        message: impl Into<String>,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
