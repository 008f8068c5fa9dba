use crate::intake::IntakeRecord;
use crate::intake::error::{ErrorKind, Result};
use exn::ResultExt;
use imgbatch_storage::FileSystem;
use imgbatch_storage::error::{ErrorKind as StorageErrorKind, Result as StorageResult};
use std::path::Path;
use std::time::Duration;

/// Bound a file system call so a hung lookup cannot stall its chunk.
async fn bounded<T>(path: &Path, timeout: Duration, call: impl Future<Output = StorageResult<T>>) -> StorageResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => exn::bail!(StorageErrorKind::Timeout(path.to_path_buf())),
    }
}

/// Fetch the size and (best-effort) pixel dimensions of one file.
///
/// A failed or timed-out stat fails the whole record. A failed or timed-out
/// dimension lookup only leaves the dimensions unset.
pub(crate) async fn resolve(fs: &dyn FileSystem, path: &Path, timeout: Duration) -> Result<IntakeRecord> {
    let stat = bounded(path, timeout, fs.stat(path)).await.or_raise(|| ErrorKind::Stat(path.to_path_buf()))?;
    let dimensions = match bounded(path, timeout, fs.dimensions(&stat.path)).await {
        Ok(dimensions) => Some(dimensions),
        Err(err) => {
            tracing::warn!(path = %stat.path.display(), error = %err, "Could not read image dimensions");
            None
        },
    };
    Ok(IntakeRecord::new(stat.path, stat.size, dimensions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgbatch_storage::Dimensions;
    use imgbatch_storage::backend::MockFileSystem;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_resolve_with_dimensions() {
        let fs = MockFileSystem::default().with_image("/photos/a.png", vec![0; 100], 10, 10);
        let record = resolve(&fs, Path::new("/photos/a.png"), TIMEOUT).await.unwrap();
        assert_eq!(record.name, "a.png");
        assert_eq!(record.size, 100);
        assert_eq!(record.dimensions, Dimensions::new(10, 10));
    }

    #[tokio::test]
    async fn test_dimension_failure_keeps_record() {
        let fs = MockFileSystem::with_files([("/photos/a.png", vec![0; 42])]);
        let record = resolve(&fs, Path::new("/photos/a.png"), TIMEOUT).await.unwrap();
        assert_eq!(record.size, 42);
        assert_eq!(record.dimensions, None);
    }

    #[tokio::test]
    async fn test_stat_failure() {
        let fs = MockFileSystem::default();
        let err = resolve(&fs, Path::new("/photos/missing.png"), TIMEOUT).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Stat(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stat_timeout() {
        let fs = MockFileSystem::default().with_image("/photos/a.png", vec![0; 10], 1, 1).stall("/photos/a.png");
        let err = resolve(&fs, Path::new("/photos/a.png"), TIMEOUT).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Stat(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dimension_timeout_keeps_record() {
        let fs = MockFileSystem::default()
            .with_image("/photos/a.png", vec![0; 10], 4, 4)
            .stall_dimensions("/photos/a.png");
        let record = resolve(&fs, Path::new("/photos/a.png"), TIMEOUT).await.unwrap();
        assert_eq!(record.size, 10);
        assert_eq!(record.dimensions, None);
    }
}
