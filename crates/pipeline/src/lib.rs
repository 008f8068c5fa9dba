//! The batch pipeline: from raw paths to reversible batch runs.
//!
//! - [`intake`] turns user-selected paths into metadata-enriched records,
//!   chunk by chunk.
//! - [`tracker`] holds those records and their processing status; it is the
//!   single source of truth for anything rendering them.
//! - [`batch`] drives an external [`Transformer`](batch::Transformer) over the
//!   pending records and records one history entry per run.
//! - [`undo`] restores the backups of a recorded run.

pub mod batch;
pub mod intake;
pub mod tracker;
pub mod undo;

pub use crate::batch::{BatchEvent, BatchOptions, BatchRunner, Transformer};
pub use crate::intake::{Intake, IntakeEvent, IntakeOptions, IntakeRecord};
pub use crate::tracker::{FileId, FileOutput, Status, TrackedFile, TrackedFiles};
pub use crate::undo::{UndoEngine, UndoReport};
