//! Bookkeeping for a batch run that has to hold even when the event stream
//! is dropped before it finishes.
//!
//! The ledger lives inside the stream. If the stream is dropped early, the
//! files that never finished go back to `Pending`, originals whose transform
//! was interrupted are restored from their backups, and the files that did
//! finish are recorded as a (shorter) history entry so they can be undone.

use crate::batch::file::{Processed, discard_backup};
use crate::batch::{BatchOptions, BatchRunner};
use crate::tracker::{FileId, Status, TrackedFile, TrackedFiles};
use imgbatch_format::{ImageFormat, OperationMode};
use imgbatch_history::{BackupRecord, NewEntry, Repository};
use imgbatch_storage::FsHandle;
use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::{Mutex, PoisonError};
use time::UtcDateTime;

/// Running totals of the finished files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunTotals {
    pub processed: u64,
    pub success: u64,
    pub failed: u64,
    pub size_before: u64,
    pub size_after: u64,
}

#[derive(Default)]
struct LedgerState {
    unfinished: HashSet<FileId>,
    /// Backups taken for files whose transform has not finished, by index.
    in_flight: HashMap<usize, BackupRecord>,
    /// Backups of successful files, by index.
    kept: Vec<(usize, BackupRecord)>,
    totals: RunTotals,
    closed: bool,
}

pub(crate) struct RunLedger<'a> {
    tracker: &'a TrackedFiles,
    fs: FsHandle,
    history: Repository,
    operation_mode: OperationMode,
    output_format: Option<ImageFormat>,
    state: Mutex<LedgerState>,
}
impl<'a> RunLedger<'a> {
    pub(crate) fn new(
        runner: &BatchRunner,
        tracker: &'a TrackedFiles,
        options: &BatchOptions,
        claimed: &[TrackedFile],
    ) -> Self {
        let state = LedgerState { unfinished: claimed.iter().map(|f| f.id).collect(), ..LedgerState::default() };
        Self {
            tracker,
            fs: runner.fs.clone(),
            history: runner.history.clone(),
            operation_mode: options.operation_mode,
            output_format: options.format.filter(|_| options.operation_mode.converts()),
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// An original has been copied and may be overwritten from now on.
    pub(crate) fn backup_taken(&self, index: usize, backup: &BackupRecord) {
        self.lock().in_flight.insert(index, backup.clone());
    }

    /// Fold a finished file into the totals.
    pub(crate) fn record(&self, processed: &Processed) -> RunTotals {
        let mut state = self.lock();
        state.unfinished.remove(&processed.result.id);
        state.in_flight.remove(&processed.index);
        if let Some(backup) = &processed.backup {
            state.kept.push((processed.index, backup.clone()));
        }
        let totals = &mut state.totals;
        totals.processed += 1;
        match processed.result.status {
            Status::Success(_) => totals.success += 1,
            _ => totals.failed += 1,
        }
        totals.size_before += processed.size_before;
        totals.size_after += processed.size_after;
        *totals
    }

    /// The history entry for everything finished so far.
    pub(crate) fn entry(&self) -> NewEntry {
        let state = self.lock();
        self.build_entry(state.kept.clone(), state.totals)
    }

    fn build_entry(&self, mut kept: Vec<(usize, BackupRecord)>, totals: RunTotals) -> NewEntry {
        kept.sort_by_key(|(index, _)| *index);
        NewEntry {
            timestamp: UtcDateTime::now(),
            operation_mode: self.operation_mode,
            output_format: self.output_format,
            files_processed: totals.processed,
            success_count: totals.success,
            failed_count: totals.failed,
            total_size_before: totals.size_before,
            total_size_after: totals.size_after,
            backups: kept.into_iter().map(|(_, backup)| backup).collect(),
        }
    }

    /// The run has been recorded (or failed to be); nothing is left to do
    /// on drop.
    pub(crate) fn close(&self) {
        self.lock().closed = true;
    }
}

impl Drop for RunLedger<'_> {
    fn drop(&mut self) {
        let state = mem::take(self.state.get_mut().unwrap_or_else(PoisonError::into_inner));
        if state.closed {
            return;
        }
        let unfinished: Vec<FileId> = state.unfinished.into_iter().collect();
        let released = self.tracker.release(&unfinished);
        tracing::warn!(released, finished = state.totals.processed, "Batch run dropped before completion");

        let interrupted: Vec<BackupRecord> = state.in_flight.into_values().collect();
        let entry = (state.totals.processed > 0).then(|| self.build_entry(state.kept, state.totals));
        if interrupted.is_empty() && entry.is_none() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(
                interrupted = interrupted.len(),
                "No runtime left to restore originals of an interrupted batch run"
            );
            return;
        };
        let fs = self.fs.clone();
        let history = self.history.clone();
        handle.spawn(async move {
            for backup in &interrupted {
                discard_backup(&fs, backup).await;
            }
            if let Some(entry) = entry {
                match history.append(entry).await {
                    Ok(entry) => tracing::info!(entry = %entry.id, "Recorded interrupted batch run"),
                    Err(err) => tracing::error!(error = ?err, "Could not record interrupted batch run"),
                }
            }
        });
    }
}
