use crate::error::{Error, ErrorKind, Result};
use crate::models::{BackupRecord, EntryId, HistoryEntry, NewEntry};
use exn::{OptionExt, ResultExt};
use imgbatch_format::{ImageFormat, OperationMode};
use std::path::{Path, PathBuf};
use time::UtcDateTime;

const NANOS_PER_MILLI: i128 = 1_000_000;

pub(crate) fn to_millis(timestamp: UtcDateTime) -> Result<i64> {
    i64::try_from(timestamp.unix_timestamp_nanos() / NANOS_PER_MILLI).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn from_millis(millis: i64) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp_nanos(i128::from(millis) * NANOS_PER_MILLI)
        .or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn path_to_text(path: &Path) -> Result<String> {
    Ok(path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
}

fn to_count(value: u64, field: &'static str) -> Result<i64> {
    i64::try_from(value).or_raise(|| ErrorKind::InvalidData(field))
}

fn from_count(value: i64, field: &'static str) -> Result<u64> {
    u64::try_from(value).or_raise(|| ErrorKind::InvalidData(field))
}

/// A row in `entries`. The id is generated by SQLite and ignored on insert.
#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub id: i64,
    pub timestamp: i64,
    pub operation_mode: String,
    pub output_format: Option<String>,
    pub files_processed: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub total_size_before: i64,
    pub total_size_after: i64,
}
impl TryFrom<&NewEntry> for EntryRow {
    type Error = Error;
    fn try_from(entry: &NewEntry) -> Result<Self> {
        Ok(Self {
            id: 0,
            timestamp: to_millis(entry.timestamp)?,
            operation_mode: entry.operation_mode.as_str().to_string(),
            output_format: entry.output_format.map(|f| f.as_str().to_string()),
            files_processed: to_count(entry.files_processed, "files processed")?,
            success_count: to_count(entry.success_count, "success count")?,
            failed_count: to_count(entry.failed_count, "failed count")?,
            total_size_before: to_count(entry.total_size_before, "total size before")?,
            total_size_after: to_count(entry.total_size_after, "total size after")?,
        })
    }
}
impl EntryRow {
    pub(crate) fn into_entry(self, backups: Vec<BackupRecord>) -> Result<HistoryEntry> {
        let entry = NewEntry {
            timestamp: from_millis(self.timestamp)?,
            operation_mode: self
                .operation_mode
                .parse::<OperationMode>()
                .or_raise(|| ErrorKind::InvalidData("operation mode"))?,
            output_format: self
                .output_format
                .map(|f| f.parse::<ImageFormat>())
                .transpose()
                .or_raise(|| ErrorKind::InvalidData("output format"))?,
            files_processed: from_count(self.files_processed, "files processed")?,
            success_count: from_count(self.success_count, "success count")?,
            failed_count: from_count(self.failed_count, "failed count")?,
            total_size_before: from_count(self.total_size_before, "total size before")?,
            total_size_after: from_count(self.total_size_after, "total size after")?,
            backups,
        };
        Ok(entry.with_id(EntryId(self.id)))
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BackupRow {
    pub entry_id: i64,
    pub original_path: String,
    pub backup_path: String,
}
impl From<BackupRow> for BackupRecord {
    fn from(row: BackupRow) -> Self {
        BackupRecord { original_path: PathBuf::from(row.original_path), backup_path: PathBuf::from(row.backup_path) }
    }
}
