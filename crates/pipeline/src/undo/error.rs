//! Error types for the [`undo`](super) module.

use derive_more::{Display, Error};
use imgbatch_history::EntryId;
use std::path::PathBuf;

/// An undo error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for undo operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No such history entry; it may already have been undone.
    #[display("history entry {_0} not found")]
    EntryNotFound(#[error(not(source))] EntryId),
    /// An undo of this entry is already running.
    #[display("history entry {_0} is already being undone")]
    InProgress(#[error(not(source))] EntryId),
    /// Some originals could not be restored. The entry is kept so the undo
    /// can be retried.
    #[display("undo of history entry {entry} could not restore {} file(s)", failed.len())]
    PartialUndo {
        entry: EntryId,
        /// Original paths that were not restored.
        failed: Vec<PathBuf>,
    },
    /// The history store could not be read or updated.
    #[display("history store error")]
    History,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::InProgress(_) | ErrorKind::PartialUndo { .. } | ErrorKind::History)
    }
}
