//! Resumable reprocessing of stored mail
//!
//! A reprocessing task walks a source of stored mails and re-runs each one
//! through the enqueue path, recording per-item success or failure as it
//! goes. A single failing item never aborts the batch; progress is
//! observable at any point, survives serialization, and a cancelled or
//! crashed task can be resumed from its last snapshot.

pub mod information;
pub mod reprocessing;
pub mod source;

pub use information::{FailureGroup, ReprocessingDetails, ReprocessingKind};
pub use reprocessing::{
    QueueReprocessor, Reprocessor, ReprocessingProgress, ReprocessingTask, TaskError, TaskOutcome,
};
pub use source::{MailLocator, MailSource, MemoryMailSource, SourceError, StoredMail};
