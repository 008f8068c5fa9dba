//! Persisted history of completed batch runs.
//!
//! Each batch run that processed at least one file leaves exactly one
//! [`HistoryEntry`] behind. Entries carry the backups taken while the run
//! overwrote originals, which is everything an undo needs.
//!
//! # Architecture
//! - **Entries** are immutable once written. They are only ever deleted,
//!   either by an undo consuming them or by an explicit history clear.
//! - **Backups** belong to exactly one entry (cascading delete) and keep the
//!   order they were taken in.
//!
//! Listing returns the newest entries first (`timestamp DESC, id DESC`).

mod db;
pub mod error;
mod models;
mod repo;
mod rows;

pub use crate::db::Database;
pub use crate::models::{BackupRecord, EntryId, HistoryEntry, NewEntry};
pub use crate::repo::Repository;
