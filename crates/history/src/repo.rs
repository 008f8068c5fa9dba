//! Repository for history entries and their backups.
//!
//! Entries and backups are written together in one transaction and read
//! back together; a backup is never visible without its entry.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{BackupRecord, EntryId, HistoryEntry, NewEntry};
use crate::rows::{BackupRow, EntryRow, from_millis, path_to_text};
use exn::ResultExt;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Append-only store of completed batch runs.
///
/// Entries are never updated. They leave the store in one of two ways:
/// [`remove`](Self::remove) after a successful undo, or [`clear`](Self::clear).
///
/// A dry-run repository reads normally but skips every write.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Persist a completed batch run and return it with its assigned id.
    ///
    /// The returned timestamp is truncated to the stored millisecond so it
    /// compares equal to what [`get`](Self::get) reads back.
    ///
    /// In dry-run mode nothing is written and the returned entry has id `0`.
    pub async fn append(&self, mut entry: NewEntry) -> Result<HistoryEntry> {
        let row = EntryRow::try_from(&entry)?;
        entry.timestamp = from_millis(row.timestamp)?;
        if self.dry_run {
            return Ok(entry.with_id(EntryId(0)));
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let id: i64 = sqlx::query_scalar(include_str!("../queries/insert_entry.sql"))
            .bind(row.timestamp)
            .bind(row.operation_mode)
            .bind(row.output_format)
            .bind(row.files_processed)
            .bind(row.success_count)
            .bind(row.failed_count)
            .bind(row.total_size_before)
            .bind(row.total_size_after)
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (position, backup) in entry.backups.iter().enumerate() {
            let position = i64::try_from(position).or_raise(|| ErrorKind::InvalidData("backup position"))?;
            sqlx::query(include_str!("../queries/insert_backup.sql"))
                .bind(id)
                .bind(position)
                .bind(path_to_text(&backup.original_path)?)
                .bind(path_to_text(&backup.backup_path)?)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::debug!(entry = id, backups = entry.backups.len(), "Recorded history entry");
        Ok(entry.with_id(EntryId(id)))
    }

    // =========================================================================
    // Get/List
    // =========================================================================

    /// Get a single entry with its backups.
    pub async fn get(&self, id: EntryId) -> Result<Option<HistoryEntry>> {
        let row: Option<EntryRow> = sqlx::query_as(include_str!("../queries/get_entry.sql"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let backups: Vec<BackupRow> = sqlx::query_as(include_str!("../queries/get_backups_for_entry.sql"))
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.into_entry(backups.into_iter().map(BackupRecord::from).collect()).map(Some)
    }

    /// List every entry, newest first.
    pub async fn list(&self) -> Result<Vec<HistoryEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(include_str!("../queries/list_entries.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let backup_rows: Vec<BackupRow> = sqlx::query_as(include_str!("../queries/list_backups.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let mut backups: HashMap<i64, Vec<BackupRecord>> = HashMap::new();
        for row in backup_rows {
            backups.entry(row.entry_id).or_default().push(row.into());
        }
        rows.into_iter()
            .map(|row| {
                let records = backups.remove(&row.id).unwrap_or_default();
                row.into_entry(records)
            })
            .collect()
    }

    /// Number of entries in the store.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_entries.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("entry count"))
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Remove an entry and its backup records.
    ///
    /// Returns `false` if there was no such entry.
    pub async fn remove(&self, id: EntryId) -> Result<bool> {
        if self.dry_run {
            return Ok(self.get(id).await?.is_some());
        }
        let result = sqlx::query(include_str!("../queries/delete_entry.sql"))
            .bind(id.0)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every entry. Returns how many were removed.
    ///
    /// Backup files on disk are left alone.
    pub async fn clear(&self) -> Result<u64> {
        if self.dry_run {
            return self.count().await;
        }
        let result = sqlx::query(include_str!("../queries/clear_entries.sql"))
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgbatch_format::{ImageFormat, OperationMode};
    use std::path::PathBuf;
    use time::UtcDateTime;

    async fn setup() -> (Database, Repository) {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        (db, repo)
    }

    fn new_entry(millis: i64, backups: usize) -> NewEntry {
        NewEntry {
            timestamp: UtcDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).unwrap(),
            operation_mode: OperationMode::Optimize,
            output_format: None,
            files_processed: 5,
            success_count: 4,
            failed_count: 1,
            total_size_before: 500,
            total_size_after: 260,
            backups: (0..backups)
                .map(|i| BackupRecord::new(format!("/photos/{i}.png"), format!("/backups/run/{i}-{i}.png")))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let (db, repo) = setup().await;
        let appended = repo.append(new_entry(1_700_000_000_000, 2)).await.unwrap();
        let fetched = repo.get(appended.id).await.unwrap().unwrap();
        assert_eq!(fetched, appended);
        assert_eq!(fetched.backups[1].original_path, PathBuf::from("/photos/1.png"));
        assert!(fetched.can_undo());
        db.close().await;
    }

    #[tokio::test]
    async fn test_append_returns_stored_timestamp() {
        let (db, repo) = setup().await;
        let mut entry = new_entry(0, 1);
        entry.timestamp = UtcDateTime::now();
        let appended = repo.append(entry).await.unwrap();
        assert_eq!(appended.timestamp.nanosecond() % 1_000_000, 0);
        let fetched = repo.get(appended.id).await.unwrap().unwrap();
        assert_eq!(fetched, appended);
        assert_eq!(repo.list().await.unwrap(), vec![appended]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_append_with_output_format() {
        let (db, repo) = setup().await;
        let mut entry = new_entry(1_700_000_000_000, 0);
        entry.operation_mode = OperationMode::Convert;
        entry.output_format = Some(ImageFormat::Webp);
        let appended = repo.append(entry).await.unwrap();
        let fetched = repo.get(appended.id).await.unwrap().unwrap();
        assert_eq!(fetched.output_format, Some(ImageFormat::Webp));
        assert!(!fetched.can_undo());
        db.close().await;
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (db, repo) = setup().await;
        assert!(repo.get(EntryId(42)).await.unwrap().is_none());
        db.close().await;
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (db, repo) = setup().await;
        let old = repo.append(new_entry(1_000, 1)).await.unwrap();
        let new = repo.append(new_entry(3_000, 2)).await.unwrap();
        // Same timestamp as `new`, later id.
        let tie = repo.append(new_entry(3_000, 0)).await.unwrap();
        let listed = repo.list().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![tie.id, new.id, old.id]);
        assert_eq!(listed[1].backups.len(), 2);
        assert_eq!(listed[2].backups.len(), 1);
        assert!(listed[0].backups.is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_remove_cascades_backups() {
        let (db, repo) = setup().await;
        let entry = repo.append(new_entry(1_000, 3)).await.unwrap();
        assert!(repo.remove(entry.id).await.unwrap());
        assert!(repo.get(entry.id).await.unwrap().is_none());
        let (orphans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM backups").fetch_one(db.pool()).await.unwrap();
        assert_eq!(orphans, 0);
        // Removing twice reports that nothing was there.
        assert!(!repo.remove(entry.id).await.unwrap());
        db.close().await;
    }

    #[tokio::test]
    async fn test_clear() {
        let (db, repo) = setup().await;
        repo.append(new_entry(1_000, 1)).await.unwrap();
        repo.append(new_entry(2_000, 0)).await.unwrap();
        assert_eq!(repo.clear().await.unwrap(), 2);
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(repo.list().await.unwrap().is_empty());
        db.close().await;
    }

    #[tokio::test]
    async fn test_dry_run_skips_writes() {
        let (db, repo) = setup().await;
        let kept = repo.append(new_entry(1_000, 1)).await.unwrap();
        let dry = Repository::new(db.pool().clone(), true);
        let unsaved = dry.append(new_entry(2_000, 1)).await.unwrap();
        assert_eq!(unsaved.id, EntryId(0));
        assert!(dry.remove(kept.id).await.unwrap());
        assert_eq!(dry.clear().await.unwrap(), 1);
        assert_eq!(repo.list().await.unwrap(), vec![kept]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_persists_across_connections() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("history.sqlite");
        let db = Database::connect(&path).await.unwrap();
        let entry = Repository::from(&db).append(new_entry(1_000, 1)).await.unwrap();
        db.close().await;
        let db = Database::connect(&path).await.unwrap();
        assert_eq!(Repository::from(&db).list().await.unwrap(), vec![entry]);
        db.close().await;
    }
}
