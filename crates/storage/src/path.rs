//! Path validation.
//!
//! Intake receives absolute paths straight from a file picker or a drop
//! event. This module rejects anything the rest of the pipeline cannot
//! safely hand to the file system.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a path received from the outside world.
///
/// The path must be absolute, must name something below the root, and must
/// not contain null bytes. `.` components are dropped and `..` components
/// are resolved lexically (without touching the file system).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use imgbatch_storage::validate_path;
/// // Valid paths
/// assert!(validate_path("/photos/holiday.png").is_ok());
/// // Invalid paths
/// assert!(validate_path("photos/holiday.png").is_err());
/// assert!(validate_path("/").is_err());
/// assert!(validate_path("/a\0b.png").is_err());
/// // Paths get resolved
/// assert_eq!(
///     validate_path("/photos/./raw/../holiday.png").unwrap(),
///     Path::new("/photos/holiday.png")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    if !original.is_absolute() {
        exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
    }
    let mut root = PathBuf::new();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls, reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::Prefix(prefix) => root.push(prefix.as_os_str()),
            Component::RootDir => root.push(component.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
        false => {
            root.extend(components);
            Ok(root)
        },
    }
}
