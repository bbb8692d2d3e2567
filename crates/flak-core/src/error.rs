//! Error types for the Flak pipeline
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for Flak operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the Flak pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Feed source errors (unreachable upstream, non-success status, blank body)
    #[error("Feed source error: {0}")]
    FeedSource(String),

    /// Transport errors that happened before a remote answered
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// A remote API rejected the request
    ///
    /// `message` carries the remote's own error detail so it can be logged verbatim.
    #[error("Remote error ({service}, status {status}): {message}")]
    Remote {
        /// Service name (e.g. "discord")
        service: String,
        /// HTTP status code returned by the remote
        status: u16,
        /// Error detail reported by the remote
        message: String,
    },

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a feed source error
    pub fn feed(msg: impl Into<String>) -> Self {
        Self::FeedSource(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a remote rejection error
    pub fn remote(service: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            service: service.into(),
            status,
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Remote error detail, if the error came back from a remote API
    ///
    /// Used when logging failed deliveries so the operator sees the
    /// remote's own explanation rather than our wrapping.
    pub fn remote_detail(&self) -> Option<&str> {
        match self {
            Self::Remote { message, .. } => Some(message),
            _ => None,
        }
    }
}
