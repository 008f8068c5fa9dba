//! Error types for the [`intake`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An intake error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for intake operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an intake failure.
///
/// Only [`Busy`](ErrorKind::Busy) ever reaches the caller of an ingest;
/// [`Stat`](ErrorKind::Stat) is isolated to the one path it concerns, which
/// is logged and left out of the results.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Another ingest is still running.
    #[display("an ingest is already in progress")]
    Busy,
    /// The file could not be read (missing, permission denied, timed out).
    #[display("could not read file metadata: {}", _0.display())]
    Stat(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Busy clears once the running ingest finishes.
        matches!(self, ErrorKind::Busy)
    }
}
