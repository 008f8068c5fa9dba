//! Intake: from raw paths to tracked records.
//!
//! User gestures (a file picker, a drop) hand over a list of absolute paths.
//! Intake filters them by extension, resolves metadata for the rest in
//! bounded concurrent chunks, and delivers the accepted records chunk by
//! chunk so partial results can be shown before the whole list is done.
//!
//! Only one ingest runs at a time per [`Intake`]; a second call while one is
//! in flight is refused with [`ErrorKind::Busy`](error::ErrorKind::Busy).

pub mod error;
mod resolve;
mod stream;

pub use self::stream::ingest;
use crate::intake::error::{ErrorKind, Result};
use crate::tracker::{FileId, TrackedFiles};
use futures::{Stream, StreamExt};
use imgbatch_config::Config;
use imgbatch_storage::{Dimensions, FsHandle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A file that passed validation and metadata lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeRecord {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Unset when the image header could not be read.
    pub dimensions: Option<Dimensions>,
}
impl IntakeRecord {
    pub fn new(path: PathBuf, size: u64, dimensions: Option<Dimensions>) -> Self {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        Self { name, path, size, dimensions }
    }
}

/// Cumulative count of paths considered so far, accepted or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeProgress {
    pub current: usize,
    pub total: usize,
}

/// Events emitted by [`ingest`], in this order:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. Per chunk: [`Batch`](Self::Batch) if the chunk accepted anything, then
///    [`Progress`](Self::Progress).
/// 3. [`Complete`](Self::Complete) exactly once.
///
/// Nothing at all is emitted for an empty path list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeEvent {
    Started { total: usize },
    Batch(Vec<IntakeRecord>),
    Progress(IntakeProgress),
    Complete { accepted: usize, total: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct IntakeOptions {
    /// Paths resolved concurrently before moving to the next chunk.
    pub batch_size: usize,
    /// Upper bound on each stat and each dimension lookup.
    pub timeout: Duration,
}
impl From<&Config> for IntakeOptions {
    fn from(config: &Config) -> Self {
        Self { batch_size: config.batch_size, timeout: config.metadata_timeout() }
    }
}
impl Default for IntakeOptions {
    fn default() -> Self {
        Self { batch_size: 10, timeout: Duration::from_secs(10) }
    }
}

/// Summary of a finished ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeSummary {
    pub accepted: usize,
    pub total: usize,
}

struct BusyGuard<'a>(&'a AtomicBool);
impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Reentrancy-guarded entry point for ingesting paths.
pub struct Intake {
    fs: FsHandle,
    options: IntakeOptions,
    busy: AtomicBool,
}
impl Intake {
    pub fn new(fs: FsHandle, options: IntakeOptions) -> Self {
        Self { fs, options, busy: AtomicBool::new(false) }
    }

    /// Whether an ingest is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        match self.busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => Ok(BusyGuard(&self.busy)),
            Err(_) => exn::bail!(ErrorKind::Busy),
        }
    }

    /// Start an ingest and return its event stream.
    ///
    /// The intake stays busy until the stream is exhausted or dropped.
    pub fn stream(&self, paths: Vec<PathBuf>) -> Result<impl Stream<Item = IntakeEvent> + '_> {
        let guard = self.acquire()?;
        let events = ingest(self.fs.clone(), paths, self.options);
        Ok(async_stream::stream! {
            let _guard = guard;
            for await event in events {
                yield event;
            }
        })
    }

    /// Ingest `paths`, handing each chunk's accepted records to `on_batch`
    /// and the running count to `on_progress`.
    pub async fn ingest(
        &self,
        paths: Vec<PathBuf>,
        mut on_batch: impl FnMut(Vec<IntakeRecord>),
        mut on_progress: impl FnMut(IntakeProgress),
    ) -> Result<IntakeSummary> {
        let total = paths.len();
        let mut summary = IntakeSummary { accepted: 0, total };
        let mut events = std::pin::pin!(self.stream(paths)?);
        while let Some(event) = events.next().await {
            match event {
                IntakeEvent::Batch(records) => on_batch(records),
                IntakeEvent::Progress(progress) => on_progress(progress),
                IntakeEvent::Complete { accepted, total } => summary = IntakeSummary { accepted, total },
                IntakeEvent::Started { .. } => {},
            }
        }
        Ok(summary)
    }

    /// Ingest `paths` straight into a tracker, chunk by chunk.
    ///
    /// Returns the ids of the added files, in input order.
    pub async fn ingest_into(&self, paths: Vec<PathBuf>, tracker: &TrackedFiles) -> Result<Vec<FileId>> {
        let mut ids = Vec::new();
        self.ingest(paths, |records| ids.extend(tracker.add(records)), |_| {}).await?;
        Ok(ids)
    }
}
