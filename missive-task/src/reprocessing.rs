use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use missive_common::{Mail, Signal};
use missive_queue::Enqueuer;

use crate::{
    information::{ReprocessingDetails, ReprocessingKind},
    source::{MailSource, SourceError},
};

/// Errors that abort a reprocessing batch.
///
/// Per-item failures are accounted in [`ReprocessingDetails`] and never
/// surface here; only a failure to walk the source is fatal.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The source repository or mailbox became unreadable mid-walk.
    #[error("Failed to walk mail source: {0}")]
    Source(#[from] SourceError),
}

/// How a reprocessing run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The source was exhausted.
    Completed,
    /// A shutdown signal arrived; progress so far is preserved.
    Cancelled,
}

/// The reprocessing entry point for one mail
#[async_trait]
pub trait Reprocessor: Send + Sync + std::fmt::Debug {
    async fn reprocess(&self, mail: Mail) -> missive_queue::Result<()>;
}

/// Re-runs stored mails through the enqueue path
///
/// Every attempt gets a fresh mail name: reusing the original name would
/// make the new incarnation indistinguishable from an already-deleted one
/// to any consumer still holding the old broker message, silently dropping
/// the reprocessed mail.
#[derive(Debug)]
pub struct QueueReprocessor {
    enqueuer: Arc<Enqueuer>,
}

impl QueueReprocessor {
    #[must_use]
    pub fn new(enqueuer: Arc<Enqueuer>) -> Self {
        Self { enqueuer }
    }
}

#[async_trait]
impl Reprocessor for QueueReprocessor {
    async fn reprocess(&self, mail: Mail) -> missive_queue::Result<()> {
        let renamed = mail.with_name(format!("reprocess-{}", ulid::Ulid::new()));
        self.enqueuer.enqueue(&renamed).await.map(|_| ())
    }
}

/// Shared, cloneable handle to a running task's progress
#[derive(Debug, Clone)]
pub struct ReprocessingProgress {
    details: Arc<RwLock<ReprocessingDetails>>,
}

impl ReprocessingProgress {
    /// A point-in-time copy of the task's accounting
    #[must_use]
    pub fn snapshot(&self) -> ReprocessingDetails {
        self.details
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

/// A resumable, progress-reporting reprocessing run over one mail source
pub struct ReprocessingTask<S> {
    source: S,
    reprocessor: Arc<dyn Reprocessor>,
    details: Arc<RwLock<ReprocessingDetails>>,
}

impl<S> ReprocessingTask<S>
where
    S: MailSource,
{
    #[must_use]
    pub fn new(kind: ReprocessingKind, source: S, reprocessor: Arc<dyn Reprocessor>) -> Self {
        Self::resume_from(ReprocessingDetails::new(kind), source, reprocessor)
    }

    /// Reconstruct a task from a serialized snapshot
    ///
    /// The accounting (including the failure list) continues from where the
    /// snapshot left off; the caller supplies a source positioned past the
    /// already-processed mails.
    #[must_use]
    pub fn resume_from(
        details: ReprocessingDetails,
        source: S,
        reprocessor: Arc<dyn Reprocessor>,
    ) -> Self {
        Self {
            source,
            reprocessor,
            details: Arc::new(RwLock::new(details)),
        }
    }

    /// Handle for polling progress while the task runs
    #[must_use]
    pub fn progress(&self) -> ReprocessingProgress {
        ReprocessingProgress {
            details: self.details.clone(),
        }
    }

    /// A point-in-time copy of the task's accounting
    #[must_use]
    pub fn snapshot(&self) -> ReprocessingDetails {
        self.progress().snapshot()
    }

    /// Walk the source, reprocessing each mail
    ///
    /// A failing item is recorded and the walk continues; only a source
    /// error aborts. Cancellation is honored between items, never mid-item,
    /// and accumulated progress is preserved either way.
    pub async fn run(
        &mut self,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<TaskOutcome, TaskError> {
        loop {
            match shutdown.try_recv() {
                Ok(Signal::Shutdown) => {
                    info!(
                        processed = self.snapshot().processed(),
                        "Reprocessing cancelled, progress preserved"
                    );
                    return Ok(TaskOutcome::Cancelled);
                }
                Ok(Signal::Finalised)
                | Err(broadcast::error::TryRecvError::Empty
                | broadcast::error::TryRecvError::Closed
                | broadcast::error::TryRecvError::Lagged(_)) => {}
            }

            let Some(stored) = self.source.next().await? else {
                let details = self.snapshot();
                info!(
                    succeeded = details.successfully_reprocessed_mail_count,
                    failed = details.failed_reprocessed_mail_count,
                    "Reprocessing completed"
                );
                return Ok(TaskOutcome::Completed);
            };

            match self.reprocessor.reprocess(stored.mail).await {
                Ok(()) => {
                    debug!(locator = %stored.locator, "Reprocessed mail");
                    self.details
                        .write()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .record_success();
                }
                Err(e) => {
                    warn!(
                        locator = %stored.locator,
                        error = %e,
                        "Reprocessing failed for mail, continuing"
                    );
                    self.details
                        .write()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .record_failure(&stored.locator);
                }
            }
        }
    }
}

impl<S> std::fmt::Debug for ReprocessingTask<S>
where
    S: MailSource,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReprocessingTask")
            .field("details", &self.snapshot())
            .finish_non_exhaustive()
    }
}
