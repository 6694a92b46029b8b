//! Error types for virtdns
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for virtdns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for virtdns
#[derive(Error, Debug)]
pub enum Error {
    /// File watcher errors (fatal to the engine)
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Input source read errors other than a missing file
    #[error("Source error: {0}")]
    Source(String),

    /// Hosts file write errors
    #[error("Hosts file error: {0}")]
    HostsFile(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a watcher error
    pub fn watcher(msg: impl Into<String>) -> Self {
        Self::Watcher(msg.into())
    }

    /// Create a source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a hosts file error
    pub fn hosts_file(msg: impl Into<String>) -> Self {
        Self::HostsFile(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
