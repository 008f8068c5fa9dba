//! Error types for the [`tracker`](super) module.

use crate::tracker::FileId;
use derive_more::{Display, Error};

/// A tracker error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No tracked file has this id (it was removed, or never existed).
    #[display("no tracked file with id {_0}")]
    NotFound(#[error(not(source))] FileId),
    /// The file is being processed and cannot be removed until it finishes.
    #[display("tracked file {_0} is being processed")]
    ConcurrentModification(#[error(not(source))] FileId),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Processing always ends in success or failure.
        matches!(self, ErrorKind::ConcurrentModification(_))
    }
}
