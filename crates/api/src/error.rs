//! API Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An API error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server address cannot be used to build requests.
    #[display("invalid server address: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    /// The request never got a response (DNS, refused connection, reset...).
    #[display("network error")]
    Network,
    /// The request took longer than the configured timeout.
    #[display("request timed out")]
    Timeout,
    /// The server answered with a non-success status.
    #[display("server responded {code}: {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body, as sent by the server.
        message: String,
    },
    /// The response body did not match the expected shape.
    #[display("malformed response body")]
    Decode,
    /// A value supplied by the caller could not be parsed.
    #[display("failed to parse {field}: {value}")]
    Parse {
        /// What was being parsed.
        field: &'static str,
        /// The rejected input.
        value: String,
    },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network | Self::Timeout => true,
            Self::Status { code, .. } => *code >= 500 || *code == 429,
            Self::InvalidUrl(_) | Self::Decode | Self::Parse { .. } => false,
        }
    }

    /// Shorthand for a "not found" answer from the server.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::Status { code: 404, message: message.into() }
    }
}
