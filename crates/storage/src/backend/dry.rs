//! Dry-run file system backend.
//!
//! This module provides a backend that wraps another implementation and
//! prevents write operations from executing, but indicating success on
//! return.

use async_trait::async_trait;
use std::path::Path;

use crate::{Dimensions, FileStat, FileSystem, FsHandle, error::Result};

/// Dry-run file system backend.
///
/// Wraps another backend and silently drops all write operations, logging an
/// [`info event`](tracing::Event). Lets an undo report what it *would*
/// restore without touching a single file.
#[derive(Clone)]
pub struct DryRunFileSystem {
    inner: FsHandle,
}
impl DryRunFileSystem {
    pub fn new(inner: FsHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl FileSystem for DryRunFileSystem {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        self.inner.stat(path).await
    }

    async fn dimensions(&self, path: &Path) -> Result<Dimensions> {
        self.inner.dimensions(path).await
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        // Still fail on a missing source so dry runs surface the same
        // per-file problems a real run would.
        let stat = self.inner.stat(from).await?;
        tracing::info!(from = %from.display(), to = %to.display(), "Skipping copy during dry-run mode");
        Ok(stat.size)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "Skipping delete during dry-run mode");
        Ok(())
    }
}
