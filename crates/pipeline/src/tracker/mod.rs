//! The ordered collection of tracked files and their processing status.
//!
//! Every mutation goes through a single [`watch`] channel, which serializes
//! writers (intake appending records, a batch run updating statuses) and
//! notifies subscribers with the new state after each change. Insertion
//! order is display order and is never changed.

pub mod error;

use crate::intake::IntakeRecord;
use crate::tracker::error::{ErrorKind, Result};
use derive_more::Display;
use imgbatch_storage::Dimensions;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// Unique (for the lifetime of a [`TrackedFiles`]) file identifier.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(u64);

/// What a successful transform produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutput {
    pub path: PathBuf,
    pub size: u64,
    pub dimensions: Option<Dimensions>,
}

/// Processing status. Success always carries its output and failure its
/// message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Pending,
    Processing,
    Success(FileOutput),
    Failed(String),
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFile {
    pub id: FileId,
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub dimensions: Option<Dimensions>,
    pub status: Status,
}
impl TrackedFile {
    pub fn output(&self) -> Option<&FileOutput> {
        match &self.status {
            Status::Success(output) => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            Status::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Number of tracked files in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub success: usize,
    pub failed: usize,
}

/// Ordered, observable store of tracked files.
pub struct TrackedFiles {
    state: watch::Sender<Vec<TrackedFile>>,
    next_id: AtomicU64,
}
impl Default for TrackedFiles {
    fn default() -> Self {
        Self { state: watch::Sender::new(Vec::new()), next_id: AtomicU64::new(1) }
    }
}
impl TrackedFiles {
    /// Apply `f` as one atomic mutation; subscribers are only notified when
    /// it reports a change.
    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<TrackedFile>) -> Result<(T, bool)>) -> Result<T> {
        let mut outcome = None;
        self.state.send_if_modified(|files| {
            let result = f(files);
            let modified = matches!(result, Ok((_, true)));
            outcome = Some(result.map(|(value, _)| value));
            modified
        });
        // send_if_modified always runs the closure.
        outcome.unwrap_or_else(|| unreachable!())
    }

    /// Append records as `Pending`, in order. Returns their new ids.
    pub fn add(&self, records: impl IntoIterator<Item = IntakeRecord>) -> Vec<FileId> {
        let files: Vec<TrackedFile> = records
            .into_iter()
            .map(|record| TrackedFile {
                id: FileId(self.next_id.fetch_add(1, Ordering::Relaxed)),
                name: record.name,
                path: record.path,
                size: record.size,
                dimensions: record.dimensions,
                status: Status::Pending,
            })
            .collect();
        let ids: Vec<FileId> = files.iter().map(|f| f.id).collect();
        self.state.send_if_modified(|state| {
            let modified = !files.is_empty();
            state.extend(files);
            modified
        });
        ids
    }

    /// Remove a file that is not being processed.
    pub fn remove(&self, id: FileId) -> Result<TrackedFile> {
        self.mutate(|files| {
            let Some(index) = files.iter().position(|f| f.id == id) else {
                exn::bail!(ErrorKind::NotFound(id));
            };
            if files[index].status == Status::Processing {
                exn::bail!(ErrorKind::ConcurrentModification(id));
            }
            Ok((files.remove(index), true))
        })
    }

    /// Remove every file, unless any of them is being processed (in which
    /// case nothing is removed). Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        self.mutate(|files| {
            if let Some(busy) = files.iter().find(|f| f.status == Status::Processing) {
                exn::bail!(ErrorKind::ConcurrentModification(busy.id));
            }
            let removed = files.len();
            files.clear();
            Ok((removed, removed > 0))
        })
    }

    pub fn update_status(&self, id: FileId, status: Status) -> Result<()> {
        self.mutate(|files| {
            let Some(file) = files.iter_mut().find(|f| f.id == id) else {
                exn::bail!(ErrorKind::NotFound(id));
            };
            let modified = file.status != status;
            file.status = status;
            Ok(((), modified))
        })
    }

    /// Mark every pending file as `Processing` and return them, in display
    /// order. Concurrent callers never claim the same file.
    pub fn claim_pending(&self) -> Vec<TrackedFile> {
        let mut claimed = Vec::new();
        self.state.send_if_modified(|files| {
            for file in files.iter_mut().filter(|f| f.status == Status::Pending) {
                file.status = Status::Processing;
                claimed.push(file.clone());
            }
            !claimed.is_empty()
        });
        claimed
    }

    /// Hand claimed files that never finished back as `Pending`. Files that
    /// are no longer `Processing` are left alone. Returns how many moved.
    pub fn release(&self, ids: &[FileId]) -> usize {
        let ids: HashSet<FileId> = ids.iter().copied().collect();
        self.reset_where(|f| f.status == Status::Processing && ids.contains(&f.id))
    }

    /// Move every failed file back to `Pending`. Returns how many moved.
    pub fn retry_failed(&self) -> usize {
        self.reset_where(|f| matches!(f.status, Status::Failed(_)))
    }

    /// Move finished files at the given paths back to `Pending`, clearing
    /// their output. Used once an undo has restored the originals.
    pub fn reset_paths(&self, paths: &[impl AsRef<Path>]) -> usize {
        let paths: HashSet<&Path> = paths.iter().map(|p| p.as_ref()).collect();
        self.reset_where(|f| {
            matches!(f.status, Status::Success(_) | Status::Failed(_)) && paths.contains(f.path.as_path())
        })
    }

    fn reset_where(&self, predicate: impl Fn(&TrackedFile) -> bool) -> usize {
        let mut count = 0;
        self.state.send_if_modified(|files| {
            for file in files.iter_mut().filter(|f| predicate(f)) {
                file.status = Status::Pending;
                count += 1;
            }
            count > 0
        });
        count
    }

    /// Current state, in display order.
    pub fn snapshot(&self) -> Vec<TrackedFile> {
        self.state.borrow().clone()
    }

    pub fn get(&self, id: FileId) -> Option<TrackedFile> {
        self.state.borrow().iter().find(|f| f.id == id).cloned()
    }

    pub fn pending(&self) -> Vec<TrackedFile> {
        self.state.borrow().iter().filter(|f| f.status == Status::Pending).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    pub fn stats(&self) -> TrackerStats {
        let files = self.state.borrow();
        let mut stats = TrackerStats { total: files.len(), ..TrackerStats::default() };
        for file in files.iter() {
            match file.status {
                Status::Pending => stats.pending += 1,
                Status::Processing => stats.processing += 1,
                Status::Success(_) => stats.success += 1,
                Status::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }

    /// Receive the full state after every change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<TrackedFile>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, size: u64) -> IntakeRecord {
        IntakeRecord::new(PathBuf::from(path), size, Dimensions::new(10, 10))
    }

    fn output(path: &str, size: u64) -> Status {
        Status::Success(FileOutput { path: PathBuf::from(path), size, dimensions: None })
    }

    fn tracker_with(n: usize) -> (TrackedFiles, Vec<FileId>) {
        let tracker = TrackedFiles::default();
        let ids = tracker.add((0..n).map(|i| record(&format!("/in/{i}.png"), i as u64)));
        (tracker, ids)
    }

    #[test]
    fn test_add_preserves_order_and_unique_ids() {
        let tracker = TrackedFiles::default();
        let first = tracker.add([record("/in/a.png", 1), record("/in/b.png", 2)]);
        let second = tracker.add([record("/in/a.png", 1)]);
        let names: Vec<_> = tracker.snapshot().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["a.png", "b.png", "a.png"]);
        let mut ids: Vec<_> = first.into_iter().chain(second).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_ids_not_reused_after_removal() {
        let (tracker, ids) = tracker_with(1);
        tracker.remove(ids[0]).unwrap();
        let again = tracker.add([record("/in/0.png", 0)]);
        assert_ne!(again[0], ids[0]);
    }

    #[test]
    fn test_remove() {
        let (tracker, ids) = tracker_with(3);
        let removed = tracker.remove(ids[1]).unwrap();
        assert_eq!(removed.id, ids[1]);
        assert_eq!(tracker.len(), 2);
        let err = tracker.remove(ids[1]).unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound(ids[1]));
    }

    #[test]
    fn test_remove_processing_rejected() {
        let (tracker, ids) = tracker_with(2);
        tracker.update_status(ids[0], Status::Processing).unwrap();
        let err = tracker.remove(ids[0]).unwrap_err();
        assert_eq!(*err, ErrorKind::ConcurrentModification(ids[0]));
        assert_eq!(tracker.len(), 2);
        // Other statuses can be removed.
        tracker.update_status(ids[1], Status::Failed("broken".to_string())).unwrap();
        tracker.remove(ids[1]).unwrap();
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_clear() {
        let (tracker, ids) = tracker_with(3);
        tracker.update_status(ids[2], Status::Processing).unwrap();
        let err = tracker.clear().unwrap_err();
        assert_eq!(*err, ErrorKind::ConcurrentModification(ids[2]));
        assert_eq!(tracker.len(), 3);
        tracker.update_status(ids[2], output("/out/2.png", 1)).unwrap();
        assert_eq!(tracker.clear().unwrap(), 3);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_status_payloads() {
        let (tracker, ids) = tracker_with(2);
        tracker.update_status(ids[0], output("/out/0.png", 7)).unwrap();
        tracker.update_status(ids[1], Status::Failed("decode error".to_string())).unwrap();
        let files = tracker.snapshot();
        assert_eq!(files[0].output().map(|o| o.size), Some(7));
        assert_eq!(files[1].error(), Some("decode error"));
        assert_eq!(files[0].error(), None);
        let err = tracker.update_status(FileId(999), Status::Pending).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_stats_and_pending() {
        let (tracker, ids) = tracker_with(4);
        tracker.update_status(ids[0], Status::Processing).unwrap();
        tracker.update_status(ids[1], output("/out/1.png", 1)).unwrap();
        tracker.update_status(ids[2], Status::Failed("x".to_string())).unwrap();
        assert_eq!(
            tracker.stats(),
            TrackerStats { total: 4, pending: 1, processing: 1, success: 1, failed: 1 }
        );
        let pending: Vec<_> = tracker.pending().into_iter().map(|f| f.id).collect();
        assert_eq!(pending, vec![ids[3]]);
    }

    #[test]
    fn test_claim_pending() {
        let (tracker, ids) = tracker_with(3);
        tracker.update_status(ids[1], Status::Failed("x".to_string())).unwrap();
        let claimed: Vec<_> = tracker.claim_pending().into_iter().map(|f| f.id).collect();
        assert_eq!(claimed, vec![ids[0], ids[2]]);
        assert_eq!(tracker.get(ids[0]).unwrap().status, Status::Processing);
        assert!(tracker.claim_pending().is_empty());
    }

    #[test]
    fn test_claim_pending_from_many_threads() {
        let tracker = std::sync::Arc::new(TrackedFiles::default());
        tracker.add((0..200).map(|i| record(&format!("/in/{i}.png"), 1)));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || tracker.claim_pending().into_iter().map(|f| f.id).collect::<Vec<_>>())
            })
            .collect();
        let mut claimed: Vec<FileId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        assert_eq!(claimed.len(), 200);
        claimed.sort();
        claimed.dedup();
        assert_eq!(claimed.len(), 200);
    }

    #[test]
    fn test_release() {
        let (tracker, ids) = tracker_with(3);
        tracker.claim_pending();
        tracker.update_status(ids[0], output("/out/0.png", 1)).unwrap();
        assert_eq!(tracker.release(&ids), 2);
        assert!(tracker.get(ids[0]).unwrap().output().is_some());
        assert_eq!(tracker.stats().pending, 2);
        assert_eq!(tracker.clear().unwrap(), 3);
    }

    #[test]
    fn test_retry_failed() {
        let (tracker, ids) = tracker_with(3);
        tracker.update_status(ids[0], Status::Failed("x".to_string())).unwrap();
        tracker.update_status(ids[1], output("/out/1.png", 1)).unwrap();
        assert_eq!(tracker.retry_failed(), 1);
        assert_eq!(tracker.get(ids[0]).unwrap().status, Status::Pending);
        assert!(tracker.get(ids[1]).unwrap().output().is_some());
    }

    #[test]
    fn test_reset_paths() {
        let (tracker, ids) = tracker_with(3);
        tracker.update_status(ids[0], output("/in/0.png", 1)).unwrap();
        tracker.update_status(ids[1], Status::Processing).unwrap();
        tracker.update_status(ids[2], output("/in/2.png", 1)).unwrap();
        let reset = tracker.reset_paths(&["/in/0.png", "/in/1.png"]);
        // Processing files are left alone.
        assert_eq!(reset, 1);
        assert_eq!(tracker.get(ids[0]).unwrap().status, Status::Pending);
        assert_eq!(tracker.get(ids[1]).unwrap().status, Status::Processing);
        assert!(tracker.get(ids[2]).unwrap().output().is_some());
    }

    #[tokio::test]
    async fn test_subscribers_see_every_change() {
        let (tracker, ids) = tracker_with(1);
        let mut rx = tracker.subscribe();
        rx.mark_unchanged();
        tracker.update_status(ids[0], Status::Processing).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update()[0].status, Status::Processing);
        // A rejected mutation does not notify.
        assert!(tracker.remove(ids[0]).is_err());
        assert!(!rx.has_changed().unwrap());
    }
}
