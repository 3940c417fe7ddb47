//! Remote Cache Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Loaders raise their own errors into
//! [`ErrorKind::Load`] so the underlying cause stays in the error tree.

use derive_more::{Display, Error};

/// A remote cache error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for loader output.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A loader failed to produce a value or a page. Reload to retry.
    #[display("failed to load remote resource")]
    Load,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load)
    }
}
