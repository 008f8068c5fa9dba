//! Format Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A format error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for format operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested image format is not in the allow-list.
    #[display("unsupported image format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The requested operation mode is not recognised.
    #[display("unknown operation mode: {_0}")]
    UnknownMode(#[error(not(source))] String),
    /// The requested resize mode is not recognised.
    #[display("unknown resize mode: {_0}")]
    UnknownResizeMode(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Parsing is deterministic; the same input fails the same way.
        false
    }
}
