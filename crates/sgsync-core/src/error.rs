//! Error types for the security group sync system
//!
//! This module defines all error types used throughout the crate. The
//! reconciler branches on the variant to apply its failure policy, so each
//! collaborator maps its failures onto exactly one of these kinds.

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the sync system
#[derive(Error, Debug)]
pub enum Error {
    /// Public IP lookup failed (timeout, DNS, non-2xx, malformed body)
    #[error("Network error: {0}")]
    Network(String),

    /// Remote firewall API call failed
    #[error("API error ({provider}): {message}")]
    Api {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Local state could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Raw I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a remote API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short machine-friendly name of the error kind, used as a log field
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Network(_) => "network",
            Error::Api { .. } => "api",
            Error::Persistence(_) => "persistence",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
