use crate::batch::error::{Error, ErrorKind, Result};
use crate::batch::ledger::RunLedger;
use crate::batch::{BatchOptions, BatchRunner, FileResult};
use crate::tracker::{FileOutput, Status, TrackedFile, TrackedFiles};
use exn::ResultExt;
use imgbatch_history::BackupRecord;
use imgbatch_storage::FsHandle;
use std::path::Path;

pub(crate) struct Processed {
    pub index: usize,
    pub result: FileResult,
    pub size_before: u64,
    pub size_after: u64,
    pub backup: Option<BackupRecord>,
}

fn failure_message(err: &Error) -> String {
    match &**err {
        ErrorKind::Transform(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Transform one file and fold the outcome into the tracker.
///
/// Never fails: every error becomes a [`Status::Failed`] for this file only.
pub(crate) async fn process_file(
    runner: &BatchRunner,
    tracker: &TrackedFiles,
    ledger: &RunLedger<'_>,
    options: &BatchOptions,
    run_dir: &Path,
    index: usize,
    file: TrackedFile,
) -> Processed {
    let (status, size_after, backup) = match transform_file(runner, ledger, options, run_dir, index, &file).await {
        Ok((output, backup)) => {
            let size = output.size;
            (Status::Success(output), size, backup)
        },
        Err(err) => {
            tracing::warn!(path = %file.path.display(), error = ?err, "Failed to process file");
            // A failed file is counted at its original size.
            (Status::Failed(failure_message(&err)), file.size, None)
        },
    };
    if let Err(err) = tracker.update_status(file.id, status.clone()) {
        tracing::warn!(id = %file.id, error = ?err, "Tracked file disappeared during processing");
    }
    Processed {
        index,
        result: FileResult { id: file.id, path: file.path, status },
        size_before: file.size,
        size_after,
        backup,
    }
}

async fn transform_file(
    runner: &BatchRunner,
    ledger: &RunLedger<'_>,
    options: &BatchOptions,
    run_dir: &Path,
    index: usize,
    file: &TrackedFile,
) -> Result<(FileOutput, Option<BackupRecord>)> {
    let backup = match options.overwrite {
        true => {
            // The index keeps same-named files from different folders apart.
            let backup_path = run_dir.join(format!("{index}-{}", file.name));
            runner.fs.copy(&file.path, &backup_path).await.or_raise(|| ErrorKind::Backup(file.path.clone()))?;
            let backup = BackupRecord::new(&file.path, backup_path);
            ledger.backup_taken(index, &backup);
            Some(backup)
        },
        false => None,
    };
    match runner.transformer.transform(&file.path, options).await {
        Ok(output) => Ok((output, backup)),
        Err(err) => {
            if let Some(backup) = backup {
                discard_backup(&runner.fs, &backup).await;
            }
            Err(err)
        },
    }
}

/// Put the original back (the transformer may have written over it before
/// failing) and drop the backup.
pub(crate) async fn discard_backup(fs: &FsHandle, backup: &BackupRecord) {
    if let Err(err) = fs.copy(&backup.backup_path, &backup.original_path).await {
        tracing::warn!(
            path = %backup.original_path.display(),
            error = ?err,
            "Could not restore original after a failed transform"
        );
        return;
    }
    if let Err(err) = fs.delete(&backup.backup_path).await {
        tracing::warn!(path = %backup.backup_path.display(), error = ?err, "Could not remove unused backup");
    }
}
