//! Local file system backend.
//!
//! Metadata and copies go through `tokio::fs` for async I/O. Dimension
//! lookups only decode the image header, on the blocking thread pool.

use crate::error::{ErrorKind, Result};
use crate::{Dimensions, FileStat, FileSystem, path::validate as validate_path};
use async_trait::async_trait;
use exn::ResultExt;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::fs;

/// Local file system backend.
///
/// # Examples
///
/// ```no_run
/// use imgbatch_storage::FileSystem;
/// use imgbatch_storage::backend::LocalFileSystem;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fs = LocalFileSystem::default();
/// let stat = fs.stat(Path::new("/photos/holiday.png")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalFileSystem {
    name: String,
}
impl LocalFileSystem {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    fn read_dimensions(path: PathBuf) -> Result<Dimensions> {
        // Sniff the header instead of trusting the extension.
        let (width, height) = image::ImageReader::open(&path)
            .and_then(|reader| reader.with_guessed_format())
            .or_raise(|| ErrorKind::Dimensions(path.clone()))?
            .into_dimensions()
            .or_raise(|| ErrorKind::Dimensions(path.clone()))?;
        match Dimensions::new(width, height) {
            Some(dimensions) => Ok(dimensions),
            None => exn::bail!(ErrorKind::Dimensions(path)),
        }
    }
}
impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new("local")
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let path = validate_path(path)?;
        let metadata = fs::metadata(&path).await.map_err(|e| Self::map_io_error(e, &path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::InvalidPath(path));
        }
        let modified = UtcDateTime::from(metadata.modified().map_err(ErrorKind::Io)?);
        Ok(FileStat::new(path, metadata.len(), modified))
    }

    async fn dimensions(&self, path: &Path) -> Result<Dimensions> {
        let path = validate_path(path)?;
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || Self::read_dimensions(task_path))
            .await
            .or_raise(|| ErrorKind::Dimensions(path.clone()))?
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(fs::try_exists(&path).await.map_err(ErrorKind::Io)?)
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        Ok(fs::copy(&from, &to).await.map_err(|e| Self::map_io_error(e, &from))?)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        Ok(fs::remove_file(&path).await.map_err(|e| Self::map_io_error(e, &path))?)
    }
}
