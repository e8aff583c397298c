//! Error types for leadrelay-core

use thiserror::Error;

use crate::dispatcher::DispatchError;

/// Main error type for the leadrelay-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error (fallback log reads/writes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Every configured sink rejected an envelope
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Result type alias for leadrelay-core
pub type Result<T> = std::result::Result<T, Error>;
