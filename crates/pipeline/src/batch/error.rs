//! Error types for the [`batch`](super) module.
//!
//! ### Per-file errors (folded into [`Status::Failed`](crate::Status::Failed))
//! - [`ErrorKind::Transform`]
//! - [`ErrorKind::Backup`]
//!
//! ### Run errors (end the stream)
//! - [`ErrorKind::InvalidOptions`]
//! - [`ErrorKind::History`]

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A batch error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for batch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An option is missing or out of range for the requested operation.
    #[display("invalid batch option: {_0}")]
    InvalidOptions(#[error(not(source))] &'static str),
    /// The transformer could not process a file.
    #[display("{_0}")]
    Transform(#[error(not(source))] String),
    /// The original could not be backed up, so it was left untouched.
    #[display("could not back up {}", _0.display())]
    Backup(#[error(not(source))] PathBuf),
    /// The completed run could not be recorded.
    #[display("could not record the batch run in history")]
    History,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Backup(_) | ErrorKind::History)
    }
}
