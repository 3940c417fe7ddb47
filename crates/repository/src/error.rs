//! Repository Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Failures of the server itself stay
//! in the error tree under [`ErrorKind::Api`].

use derive_more::{Display, Error};

/// A repository error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No server is configured yet.
    #[display("not connected to a server")]
    NotConnected,
    /// The server address cannot be used.
    #[display("invalid server address")]
    InvalidUrl,
    /// The server rejected the request or could not be reached.
    #[display("server request failed")]
    Api,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Api)
    }
}
