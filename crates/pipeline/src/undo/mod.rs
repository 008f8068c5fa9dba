//! Undo of a recorded batch run.
//!
//! Every backup of the entry is copied back over its original. Each restore
//! is attempted independently; the entry is only removed once every
//! restore succeeded, and its backup files only after that. Otherwise the entry stays in
//! history and [`PartialUndo`](error::ErrorKind::PartialUndo) lists what is
//! left, so the undo can simply be run again.

pub mod error;

use crate::tracker::TrackedFiles;
use crate::undo::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use imgbatch_history::{EntryId, Repository};
use imgbatch_storage::FsHandle;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing::instrument;

/// What a successful undo restored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoReport {
    pub entry: EntryId,
    /// Original paths, in backup order.
    pub restored: Vec<PathBuf>,
}

/// Removes the entry id from the in-flight set when the undo finishes.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<EntryId>>,
    id: EntryId,
}
impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

pub struct UndoEngine {
    fs: FsHandle,
    history: Repository,
    in_flight: Mutex<HashSet<EntryId>>,
}
impl UndoEngine {
    pub fn new(fs: FsHandle, history: Repository) -> Self {
        Self { fs, history, in_flight: Mutex::new(HashSet::new()) }
    }

    fn claim(&self, id: EntryId) -> Result<InFlight<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(id) {
            exn::bail!(ErrorKind::InProgress(id));
        }
        Ok(InFlight { set: &self.in_flight, id })
    }

    /// Restore every backup of `id`.
    ///
    /// Tracked files whose originals were restored go back to `Pending` in
    /// `tracker`, if one is given. An entry without backups is left alone
    /// and reports nothing restored.
    #[instrument(skip(self, tracker), fields(fs = self.fs.name()))]
    pub async fn undo(&self, id: EntryId, tracker: Option<&TrackedFiles>) -> Result<UndoReport> {
        let _claim = self.claim(id)?;
        let entry = self
            .history
            .get(id)
            .await
            .or_raise(|| ErrorKind::History)?
            .ok_or_raise(|| ErrorKind::EntryNotFound(id))?;
        if !entry.can_undo() {
            tracing::info!("Nothing to restore");
            return Ok(UndoReport { entry: id, restored: vec![] });
        }

        let mut restored = Vec::new();
        let mut failed = Vec::new();
        for backup in &entry.backups {
            // Copy rather than move, so a failed undo can be retried.
            match self.fs.copy(&backup.backup_path, &backup.original_path).await {
                Ok(_) => restored.push(backup.original_path.clone()),
                Err(err) => {
                    tracing::warn!(path = %backup.original_path.display(), error = ?err, "Could not restore original");
                    failed.push(backup.original_path.clone());
                },
            }
        }
        if !failed.is_empty() {
            exn::bail!(ErrorKind::PartialUndo { entry: id, failed });
        }

        // Backups outlive the entry: if it cannot be removed, a retry still
        // has everything it needs.
        self.history.remove(id).await.or_raise(|| ErrorKind::History)?;
        for backup in &entry.backups {
            if let Err(err) = self.fs.delete(&backup.backup_path).await {
                tracing::warn!(path = %backup.backup_path.display(), error = ?err, "Could not remove backup");
            }
        }
        if let Some(tracker) = tracker {
            tracker.reset_paths(&restored);
        }
        tracing::info!(restored = restored.len(), "Undo complete");
        Ok(UndoReport { entry: id, restored })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::IntakeRecord;
    use crate::tracker::{FileOutput, Status};
    use imgbatch_format::OperationMode;
    use imgbatch_history::{BackupRecord, Database, HistoryEntry, NewEntry};
    use imgbatch_storage::backend::{DryRunFileSystem, MockFileSystem};
    use std::sync::Arc;
    use time::UtcDateTime;

    async fn record(repo: &Repository, backups: Vec<BackupRecord>) -> HistoryEntry {
        let entry = NewEntry {
            timestamp: UtcDateTime::now(),
            operation_mode: OperationMode::Optimize,
            output_format: None,
            files_processed: backups.len() as u64,
            success_count: backups.len() as u64,
            failed_count: 0,
            total_size_before: 20,
            total_size_after: 10,
            backups,
        };
        repo.append(entry).await.unwrap()
    }

    /// Two optimized originals with their backups in place.
    fn files() -> MockFileSystem {
        MockFileSystem::default()
            .with_image("/photos/a.png", b"small-a".to_vec(), 1, 1)
            .with_image("/photos/b.png", b"small-b".to_vec(), 1, 1)
            .with_image("/backups/1/0-a.png", b"original-a".to_vec(), 1, 1)
            .with_image("/backups/1/1-b.png", b"original-b".to_vec(), 1, 1)
    }

    fn backups() -> Vec<BackupRecord> {
        vec![
            BackupRecord::new("/photos/a.png", "/backups/1/0-a.png"),
            BackupRecord::new("/photos/b.png", "/backups/1/1-b.png"),
        ]
    }

    #[tokio::test]
    async fn test_undo_restores_and_consumes_entry() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let fs = Arc::new(files());
        let entry = record(&repo, backups()).await;
        let engine = UndoEngine::new(fs.clone(), repo.clone());

        let report = engine.undo(entry.id, None).await.unwrap();
        assert_eq!(report.restored, vec![PathBuf::from("/photos/a.png"), PathBuf::from("/photos/b.png")]);
        assert_eq!(fs.contents("/photos/a.png").await.unwrap(), b"original-a");
        assert_eq!(fs.contents("/photos/b.png").await.unwrap(), b"original-b");
        assert!(fs.contents("/backups/1/0-a.png").await.is_none());
        assert!(repo.get(entry.id).await.unwrap().is_none());

        // A second undo of the same entry finds nothing.
        let err = engine.undo(entry.id, None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::EntryNotFound(_)));
        assert_eq!(fs.contents("/photos/a.png").await.unwrap(), b"original-a");
    }

    #[tokio::test]
    async fn test_partial_undo_keeps_entry() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let mut backups = backups();
        backups[1].backup_path = PathBuf::from("/backups/1/missing.png");
        let fs = Arc::new(files());
        let entry = record(&repo, backups).await;
        let engine = UndoEngine::new(fs.clone(), repo.clone());

        let err = engine.undo(entry.id, None).await.unwrap_err();
        match &*err {
            ErrorKind::PartialUndo { entry: id, failed } => {
                assert_eq!(*id, entry.id);
                assert_eq!(failed, &vec![PathBuf::from("/photos/b.png")]);
            },
            other => panic!("unexpected error: {other}"),
        }
        // The restorable original is back, and nothing was thrown away.
        assert_eq!(fs.contents("/photos/a.png").await.unwrap(), b"original-a");
        assert!(fs.contents("/backups/1/0-a.png").await.is_some());
        assert_eq!(repo.get(entry.id).await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn test_retry_after_partial_undo() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let fs = Arc::new(files().deny("/photos/b.png"));
        let entry = record(&repo, backups()).await;
        assert!(UndoEngine::new(fs.clone(), repo.clone()).undo(entry.id, None).await.is_err());

        // Same backups, now restorable.
        let fs = Arc::new(files());
        let report = UndoEngine::new(fs.clone(), repo.clone()).undo(entry.id, None).await.unwrap();
        assert_eq!(report.restored.len(), 2);
    }

    #[tokio::test]
    async fn test_backups_survive_failed_entry_removal() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let fs = Arc::new(files());
        let entry = record(&repo, backups()).await;
        sqlx::query("CREATE TRIGGER keep_entries BEFORE DELETE ON entries BEGIN SELECT RAISE(ABORT, 'locked'); END")
            .execute(db.pool())
            .await
            .unwrap();
        let engine = UndoEngine::new(fs.clone(), repo.clone());

        let err = engine.undo(entry.id, None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::History));
        assert!(repo.get(entry.id).await.unwrap().is_some());
        assert_eq!(fs.contents("/backups/1/0-a.png").await.unwrap(), b"original-a");
        assert_eq!(fs.contents("/backups/1/1-b.png").await.unwrap(), b"original-b");

        sqlx::query("DROP TRIGGER keep_entries").execute(db.pool()).await.unwrap();
        let report = engine.undo(entry.id, None).await.unwrap();
        assert_eq!(report.restored.len(), 2);
        assert!(repo.get(entry.id).await.unwrap().is_none());
        assert!(fs.contents("/backups/1/0-a.png").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_without_backups_is_a_no_op() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let entry = record(&repo, vec![]).await;
        let engine = UndoEngine::new(Arc::new(MockFileSystem::default()), repo.clone());
        let report = engine.undo(entry.id, None).await.unwrap();
        assert!(report.restored.is_empty());
        assert!(repo.get(entry.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undo_resets_tracked_files() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let entry = record(&repo, backups()).await;
        let tracker = TrackedFiles::default();
        let ids = tracker.add([
            IntakeRecord::new(PathBuf::from("/photos/a.png"), 10, None),
            IntakeRecord::new(PathBuf::from("/photos/other.png"), 10, None),
        ]);
        for id in &ids {
            let output = FileOutput { path: PathBuf::from("/photos/a.png"), size: 5, dimensions: None };
            tracker.update_status(*id, Status::Success(output)).unwrap();
        }
        UndoEngine::new(Arc::new(files()), repo).undo(entry.id, Some(&tracker)).await.unwrap();
        assert_eq!(tracker.get(ids[0]).unwrap().status, Status::Pending);
        assert!(matches!(tracker.get(ids[1]).unwrap().status, Status::Success(_)));
    }

    #[tokio::test]
    async fn test_concurrent_undo_of_same_entry() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let entry = record(&repo, backups()).await;
        let engine = UndoEngine::new(Arc::new(files()), repo);
        let _claim = engine.claim(entry.id).unwrap();
        let err = engine.undo(entry.id, None).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InProgress(_)));
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let entry = record(&repo, backups()).await;
        let fs = Arc::new(files());
        let engine = UndoEngine::new(
            Arc::new(DryRunFileSystem::new(fs.clone())),
            Repository::new(db.pool().clone(), true),
        );
        let report = engine.undo(entry.id, None).await.unwrap();
        assert_eq!(report.restored.len(), 2);
        assert_eq!(fs.contents("/photos/a.png").await.unwrap(), b"small-a");
        assert!(fs.contents("/backups/1/0-a.png").await.is_some());
        assert!(repo.get(entry.id).await.unwrap().is_some());
    }
}
