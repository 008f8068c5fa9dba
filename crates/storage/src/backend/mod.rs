//! File system trait and implementations.
//!
//! This module defines the `FileSystem` trait, the single boundary through
//! which the pipeline touches files: metadata lookups during intake, backup
//! copies during a batch run, and restores during undo.
//!

mod dry;
mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::dry::DryRunFileSystem;
pub use self::local::LocalFileSystem;
#[cfg(feature = "mock")]
pub use self::mock::MockFileSystem;
use crate::error::Result;
use crate::models::{Dimensions, FileStat};
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for file system access.
///
/// All operations are asynchronous; intake issues many of them concurrently
/// and suspends at each call. Every path is absolute and must be validated
/// using [`validate_path`](crate::validate_path) before use. Implementations
/// should enforce this validation.
///
/// Stat and dimension lookups fail independently: a file whose header cannot
/// be parsed still has a size.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use imgbatch_storage::{FileSystem, error::Result};
///
/// async fn describe(fs: &dyn FileSystem, path: &Path) -> Result<String> {
///     let stat = fs.stat(path).await?;
///     Ok(match fs.dimensions(path).await {
///         Ok(d) => format!("{} bytes, {}x{}", stat.size, d.width, d.height),
///         Err(_) => format!("{} bytes", stat.size),
///     })
/// }
/// ```
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Name of the implementation (used for logging only).
    fn name(&self) -> &str;

    /// Get file metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist, and [`PermissionDenied`](crate::error::ErrorKind::PermissionDenied)
    /// if it cannot be read.
    async fn stat(&self, path: &Path) -> Result<FileStat>;

    /// Read the pixel dimensions of an image.
    ///
    /// Best-effort: returns [`Dimensions`](crate::error::ErrorKind::Dimensions)
    /// when the header cannot be decoded or reports a zero-sized image.
    async fn dimensions(&self, path: &Path) -> Result<Dimensions>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Copy a file, overwriting the destination if it already exists.
    ///
    /// Returns the number of bytes copied.
    ///
    /// # Notes
    /// - Implementations should create parent directories as needed.
    async fn copy(&self, from: &Path, to: &Path) -> Result<u64>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;
}
