//! CLI Error Types

use derive_more::{Display, Error};
use lisu_remote::LoadError;

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI commands.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("no server configured; pass --server or set server.base_url")]
    NoServer,
    #[display("invalid server address")]
    Server,
    /// A resource failed to load. Keeps the loader's own error tree.
    #[display("failed to load {what}")]
    Load {
        what: &'static str,
        cause: LoadError,
    },
    #[display("request failed")]
    Request,
}

/// Render `err` as a tree. A failed load hangs the loader's tree below it.
pub fn report(err: &Error) -> String {
    let mut report = format!("{err:?}");
    if let ErrorKind::Load { cause, .. } = &**err {
        for (i, line) in format!("{cause:?}").lines().enumerate() {
            report.push('\n');
            report.push_str(if i == 0 { "`-- " } else { "    " });
            report.push_str(line);
        }
    }
    report
}
