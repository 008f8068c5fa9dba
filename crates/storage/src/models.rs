//! Storage models.
//!
//! These types carry what the file system boundary knows about a file:
//! cheap `stat` metadata, and the (independently failable) pixel dimensions.

use std::path::PathBuf;
use time::UtcDateTime;

/// File metadata returned by [`FileSystem::stat`](crate::FileSystem::stat).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Absolute path of the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: UtcDateTime,
}
impl FileStat {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: UtcDateTime) -> Self {
        Self { path: path.into(), size, modified }
    }
}

/// Pixel dimensions of an image. Both axes are always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}
impl Dimensions {
    /// Returns `None` when either axis is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }
}
