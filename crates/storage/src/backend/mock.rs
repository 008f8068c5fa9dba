//! In-memory file system backend for testing.

use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{Dimensions, FileStat, FileSystem};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use time::UtcDateTime;
use tokio::sync::RwLock;

struct MockFile {
    data: Vec<u8>,
    dimensions: Option<Dimensions>,
    modified: UtcDateTime,
}

/// Decrements the in-flight counter when a lookup finishes (or is dropped
/// by a timeout).
struct InFlight<'a>(&'a AtomicUsize);
impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory file system backend for testing.
///
/// Files are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self` without external synchronisation. Failures can be
/// injected per path, and the peak number of concurrent metadata lookups is
/// recorded so tests can assert on fan-out bounds.
///
/// # Examples
///
/// ```
/// use imgbatch_storage::FileSystem;
/// use imgbatch_storage::backend::MockFileSystem;
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fs = MockFileSystem::default()
///     .with_image("/photos/a.png", vec![0; 100], 10, 10)
///     .deny("/photos/secret.png");
/// assert_eq!(fs.stat(Path::new("/photos/a.png")).await?.size, 100);
/// assert!(fs.stat(Path::new("/photos/secret.png")).await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockFileSystem {
    name: String,
    storage: RwLock<HashMap<PathBuf, MockFile>>,
    denied: HashSet<PathBuf>,
    stalled: HashSet<PathBuf>,
    stalled_dimensions: HashSet<PathBuf>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockFileSystem {
    /// Create a mock file system pre-populated with files that have no
    /// readable dimensions.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = UtcDateTime::now();
        for (path, data) in files {
            let path = Self::checked(path.into());
            map.insert(path, MockFile { data: data.into(), dimensions: None, modified: now });
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            denied: HashSet::new(),
            stalled: HashSet::new(),
            stalled_dimensions: HashSet::new(),
            latency: None,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn checked(path: PathBuf) -> PathBuf {
        let Ok(validated) = validate_path(&path) else {
            // Builders have no error result; a bad fixture path fails the test.
            panic!("MockFileSystem: invalid path {}", path.display());
        };
        validated
    }

    /// Add an image with known pixel dimensions.
    pub fn with_image(mut self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>, width: u32, height: u32) -> Self {
        let path = Self::checked(path.into());
        let file = MockFile {
            data: data.into(),
            dimensions: Dimensions::new(width, height),
            modified: UtcDateTime::now(),
        };
        self.storage.get_mut().insert(path, file);
        self
    }

    /// Every operation touching `path` fails with `PermissionDenied`.
    pub fn deny(mut self, path: impl Into<PathBuf>) -> Self {
        self.denied.insert(Self::checked(path.into()));
        self
    }

    /// Metadata lookups for `path` never complete.
    pub fn stall(mut self, path: impl Into<PathBuf>) -> Self {
        self.stalled.insert(Self::checked(path.into()));
        self
    }

    /// Dimension lookups for `path` never complete; stat still answers.
    pub fn stall_dimensions(mut self, path: impl Into<PathBuf>) -> Self {
        self.stalled_dimensions.insert(Self::checked(path.into()));
        self
    }

    /// Every metadata lookup sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Highest number of metadata lookups that were in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Current contents of a file, if it exists.
    pub async fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let path = validate_path(path.as_ref()).ok()?;
        self.storage.read().await.get(&path).map(|f| f.data.clone())
    }

    /// Create or overwrite a file, keeping known dimensions if it existed.
    pub async fn write(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = validate_path(path.as_ref())?;
        let mut guard = self.storage.write().await;
        let dimensions = guard.get(&path).and_then(|f| f.dimensions);
        guard.insert(path, MockFile { data: data.into(), dimensions, modified: UtcDateTime::now() });
        Ok(())
    }

    async fn enter(&self, path: &Path, stalled: &HashSet<PathBuf>) -> Result<InFlight<'_>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if self.stalled.contains(path) || stalled.contains(path) {
            std::future::pending::<()>().await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.denied.contains(path) {
            exn::bail!(ErrorKind::PermissionDenied(path.to_path_buf()));
        }
        Ok(guard)
    }
}
impl Default for MockFileSystem {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl FileSystem for MockFileSystem {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let path = validate_path(path)?;
        let _guard = self.enter(&path, &HashSet::new()).await?;
        let storage = self.storage.read().await;
        let file = storage.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(FileStat::new(path.clone(), file.data.len() as u64, file.modified))
    }

    async fn dimensions(&self, path: &Path) -> Result<Dimensions> {
        let path = validate_path(path)?;
        let _guard = self.enter(&path, &self.stalled_dimensions).await?;
        let storage = self.storage.read().await;
        let file = storage.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        file.dimensions.ok_or_else(|| exn::Exn::from(ErrorKind::Dimensions(path.clone())))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        for path in [&from, &to] {
            if self.denied.contains(path) {
                exn::bail!(ErrorKind::PermissionDenied(path.clone()));
            }
        }
        let mut guard = self.storage.write().await;
        let source = guard.get(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from.clone())))?;
        let copy = MockFile { data: source.data.clone(), dimensions: source.dimensions, modified: UtcDateTime::now() };
        let size = copy.data.len() as u64;
        guard.insert(to, copy);
        Ok(size)
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        if self.denied.contains(&path) {
            exn::bail!(ErrorKind::PermissionDenied(path));
        }
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stat_and_dimensions() {
        let fs = MockFileSystem::default().with_image("/a.png", vec![0; 100], 10, 20);
        let stat = fs.stat(Path::new("/a.png")).await.unwrap();
        assert_eq!(stat.size, 100);
        assert_eq!(fs.dimensions(Path::new("/a.png")).await.unwrap(), Dimensions { width: 10, height: 20 });
    }

    #[tokio::test]
    async fn test_dimensions_fail_independently() {
        let fs = MockFileSystem::with_files([("/plain.png", b"data".to_vec())]);
        assert!(fs.stat(Path::new("/plain.png")).await.is_ok());
        let err = fs.dimensions(Path::new("/plain.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Dimensions(_)));
    }

    #[tokio::test]
    async fn test_stat_not_found() {
        let fs = MockFileSystem::default();
        let err = fs.stat(Path::new("/missing.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_denied() {
        let fs = MockFileSystem::with_files([("/secret.png", b"data".to_vec())]).deny("/secret.png");
        let err = fs.stat(Path::new("/secret.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));
        let err = fs.copy(Path::new("/secret.png"), Path::new("/copy.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_copy_and_delete() {
        let fs = MockFileSystem::default().with_image("/a.png", b"pixels".to_vec(), 1, 1);
        assert_eq!(fs.copy(Path::new("/a.png"), Path::new("/backup/a.png")).await.unwrap(), 6);
        assert_eq!(fs.contents("/backup/a.png").await.unwrap(), b"pixels");
        fs.delete(Path::new("/a.png")).await.unwrap();
        assert!(!fs.exists(Path::new("/a.png")).await.unwrap());
        let err = fs.delete(Path::new("/a.png")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_peak_concurrency() {
        let fs = MockFileSystem::with_files([("/a.png", b"a".to_vec()), ("/b.png", b"b".to_vec())])
            .with_latency(Duration::from_millis(20));
        let a = Path::new("/a.png");
        let b = Path::new("/b.png");
        let (ra, rb) = tokio::join!(fs.stat(a), fs.stat(b));
        assert!(ra.is_ok() && rb.is_ok());
        assert_eq!(fs.peak_concurrency(), 2);
    }

    #[tokio::test]
    async fn test_relative_path_rejected() {
        let fs = MockFileSystem::default();
        assert!(fs.stat(Path::new("relative.png")).await.is_err());
    }

    #[test]
    #[should_panic(expected = "invalid path")]
    fn test_with_files_panics_on_bad_path() {
        MockFileSystem::with_files([("relative.png", b"bad".to_vec())]);
    }
}
