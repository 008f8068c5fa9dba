//! Batch runs over the pending tracked files.
//!
//! The pixel work itself happens behind the [`Transformer`] trait. A
//! [`BatchRunner`] feeds it the pending files with bounded concurrency,
//! backs up originals before they are overwritten, folds every outcome back
//! into the [`TrackedFiles`](crate::TrackedFiles) store, and records exactly
//! one history entry per run that processed anything.

pub mod error;
mod file;
mod ledger;
mod options;
mod stream;

pub use self::options::BatchOptions;
use crate::batch::error::Result;
use crate::tracker::{FileId, FileOutput, Status, TrackedFiles};
use async_trait::async_trait;
use futures::Stream;
use imgbatch_config::Config;
use imgbatch_history::{HistoryEntry, Repository};
use imgbatch_storage::FsHandle;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The opaque decode, transform and re-encode step.
///
/// Implementations write their output (to `options.output_dir`, or over
/// `path` when `options.overwrite` is set) and describe what they wrote.
/// Failures should be raised as
/// [`ErrorKind::Transform`](error::ErrorKind::Transform) with a message fit
/// for display next to the file.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, path: &Path, options: &BatchOptions) -> Result<FileOutput>;
}

/// Outcome of one file in a batch run. The status is always
/// [`Success`](Status::Success) or [`Failed`](Status::Failed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub id: FileId,
    pub path: PathBuf,
    pub status: Status,
}

/// Aggregate progress, emitted after every finished file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// The file that just finished.
    pub current_file: Option<PathBuf>,
}

/// Events emitted by [`BatchRunner::process`], in this order:
/// 1. [`Started`](Self::Started) exactly once, with the number of files.
/// 2. Per file: [`Processed`](Self::Processed), then [`Progress`](Self::Progress).
/// 3. [`Complete`](Self::Complete) exactly once, with the recorded entry
///    (`None` when there was nothing to process).
///
/// Invalid options or a failure to record the run end the stream with an
/// `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    Started(usize),
    Progress(BatchProgress),
    Processed(FileResult),
    Complete(Option<HistoryEntry>),
}

pub struct BatchRunner {
    fs: FsHandle,
    transformer: Arc<dyn Transformer>,
    history: Repository,
    backup_dir: PathBuf,
    max_concurrency: usize,
}
impl BatchRunner {
    /// Backups of overwritten originals go to a per-run directory below
    /// `backup_dir`.
    pub fn new(
        fs: FsHandle,
        transformer: Arc<dyn Transformer>,
        history: Repository,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self { fs, transformer, history, backup_dir: backup_dir.into(), max_concurrency: 4 }
    }

    /// A runner using the configured backup directory and concurrency.
    pub fn from_config(fs: FsHandle, transformer: Arc<dyn Transformer>, history: Repository, config: &Config) -> Self {
        Self::new(fs, transformer, history, &config.backup_dir).with_max_concurrency(config.max_concurrency)
    }

    /// Number of files transformed at once (at least one).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Process every pending file in `tracker`.
    ///
    /// Dropping the stream early hands the unfinished files back as
    /// `Pending`, restores originals whose transform was cut short, and
    /// records whatever did finish as its own history entry.
    pub fn process<'a>(
        &'a self,
        tracker: &'a TrackedFiles,
        options: &'a BatchOptions,
    ) -> impl Stream<Item = Result<BatchEvent>> + 'a {
        self::stream::process(self, tracker, options)
    }
}
