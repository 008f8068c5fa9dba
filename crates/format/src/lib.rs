//! Image format detection and batch operation vocabulary.
//!
//! This crate wraps the set of image formats the batch pipeline accepts
//! behind a unified [`ImageFormat`] enum, providing:
//!
//! - **Path validation** via [`is_supported`], a case-insensitive match of a
//!   file name's extension against the allow-list
//! - **Format detection** from file extensions ([`ImageFormat::from_path`]) or
//!   magic bytes ([`ImageFormat::from_magic_bytes`])
//! - **Operation vocabulary** ([`OperationMode`], [`ResizeMode`]) shared by
//!   the batch runner and the persisted history
//!
//! A path with no extension, or an extension outside the allow-list, is not
//! an error. It is simply not supported and gets excluded upstream.

mod construct;
pub mod error;
mod mode;
mod util;

pub use crate::mode::{OperationMode, ResizeMode};
use std::path::Path;

/// A supported image format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Portable Network Graphics (.png)
    Png,
    /// JPEG (.jpg, .jpeg)
    Jpeg,
    /// WebP (.webp)
    Webp,
    /// Tagged Image File Format (.tiff, .tif)
    Tiff,
    /// Windows bitmap (.bmp)
    Bmp,
    /// Quite OK Image format (.qoi)
    Qoi,
    /// Graphics Interchange Format (.gif)
    Gif,
}

impl ImageFormat {
    /// Every supported format, in display order.
    pub const ALL: [ImageFormat; 7] = [
        ImageFormat::Png,
        ImageFormat::Jpeg,
        ImageFormat::Webp,
        ImageFormat::Tiff,
        ImageFormat::Bmp,
        ImageFormat::Qoi,
        ImageFormat::Gif,
    ];
}

/// Is `name` (a file name or full path) an acceptable image by extension?
///
/// ```
/// use imgbatch_format::is_supported;
/// assert!(is_supported("/photos/holiday.JPG"));
/// assert!(is_supported("scan.tif"));
/// assert!(!is_supported("notes.txt"));
/// assert!(!is_supported("README"));
/// ```
#[must_use]
pub fn is_supported(name: impl AsRef<Path>) -> bool {
    ImageFormat::from_path(name).is_some()
}
