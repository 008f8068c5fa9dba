use derive_more::Display;
use imgbatch_format::{ImageFormat, OperationMode};
use std::path::PathBuf;
use time::UtcDateTime;

/// Identifier of a persisted history entry.
///
/// Assigned by the database; never reused, even after the entry is removed.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub i64);

/// A copy of an original file saved before a batch run overwrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
}
impl BackupRecord {
    pub fn new(original_path: impl Into<PathBuf>, backup_path: impl Into<PathBuf>) -> Self {
        Self { original_path: original_path.into(), backup_path: backup_path.into() }
    }
}

/// A completed batch run that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub timestamp: UtcDateTime,
    pub operation_mode: OperationMode,
    pub output_format: Option<ImageFormat>,
    pub files_processed: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub total_size_before: u64,
    pub total_size_after: u64,
    pub backups: Vec<BackupRecord>,
}
impl NewEntry {
    pub(crate) fn with_id(self, id: EntryId) -> HistoryEntry {
        HistoryEntry {
            id,
            timestamp: self.timestamp,
            operation_mode: self.operation_mode,
            output_format: self.output_format,
            files_processed: self.files_processed,
            success_count: self.success_count,
            failed_count: self.failed_count,
            total_size_before: self.total_size_before,
            total_size_after: self.total_size_after,
            backups: self.backups,
        }
    }
}

/// Immutable record of one completed batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: EntryId,
    /// When the run completed, with millisecond precision.
    pub timestamp: UtcDateTime,
    pub operation_mode: OperationMode,
    pub output_format: Option<ImageFormat>,
    pub files_processed: u64,
    pub success_count: u64,
    pub failed_count: u64,
    pub total_size_before: u64,
    pub total_size_after: u64,
    /// Backups in the order they were taken.
    pub backups: Vec<BackupRecord>,
}
impl HistoryEntry {
    /// Whether there is anything for an undo to restore.
    pub fn can_undo(&self) -> bool {
        !self.backups.is_empty()
    }

    /// Bytes saved by the run. Negative when the outputs grew.
    pub fn saved_bytes(&self) -> i128 {
        i128::from(self.total_size_before) - i128::from(self.total_size_after)
    }
}
