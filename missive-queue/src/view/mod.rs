//! Broker-independent consistency view of the queue
//!
//! Browsing a broker's internal queue structure is typically impossible or
//! destructive, so operational tooling (list/count/delete/reprocess) acts on
//! this secondary index instead. The view is an over-approximation of broker
//! content: it may transiently list items already consumed (reconciled
//! lazily when a dequeuer settles them) but never omits an item the broker
//! still holds. The broker stays authoritative for delivery.

pub mod memory;

use ahash::AHashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryQueueView;
use missive_blob::BlobPartsId;
use missive_common::{EnqueueId, Mail};

use crate::name::QueueName;

/// Errors surfaced by the queue view boundary.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The underlying indexed store failed.
    #[error("Queue view store error: {0}")]
    Store(String),
}

/// The operator-visible record of one mail in the queue
///
/// Written by the enqueuer immediately after a successful broker publish -
/// never before, so the view can never advertise a mail the broker does not
/// hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnqueuedItem {
    pub enqueue_id: EnqueueId,
    pub queue_name: QueueName,
    pub name: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub state: String,
    pub attributes: AHashMap<String, String>,
    pub enqueued_at: DateTime<Utc>,
    pub parts: BlobPartsId,
}

impl EnqueuedItem {
    /// Record an enqueue of `mail` under `queue_name` at `enqueued_at`
    #[must_use]
    pub fn new(
        enqueue_id: EnqueueId,
        queue_name: QueueName,
        mail: &Mail,
        enqueued_at: DateTime<Utc>,
        parts: BlobPartsId,
    ) -> Self {
        Self {
            enqueue_id,
            queue_name,
            name: mail.name().to_string(),
            sender: mail.sender().to_string(),
            recipients: mail.recipients().to_vec(),
            state: mail.state().to_string(),
            attributes: mail.attributes().clone(),
            enqueued_at,
            parts,
        }
    }
}

/// Predicate over view entries, used by `delete_matching`
pub type Predicate<'a> = &'a (dyn for<'p> Fn(&'p EnqueuedItem) -> bool + Send + Sync);

/// Restartable cursor over the live entries of one queue
///
/// Consistency model: snapshot-at-call. The cursor holds the set of live
/// entries as of the `browse` call, ordered by enqueue timestamp (ties
/// broken by id); mutations after the call are not reflected. An item is
/// never yielded twice, and concurrent stores/deletes never invalidate an
/// open cursor.
#[derive(Debug)]
pub struct Browse {
    items: std::vec::IntoIter<EnqueuedItem>,
}

impl Browse {
    #[must_use]
    pub fn new(mut items: Vec<EnqueuedItem>) -> Self {
        items.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.enqueue_id.cmp(&b.enqueue_id))
        });
        Self {
            items: items.into_iter(),
        }
    }
}

impl Iterator for Browse {
    type Item = EnqueuedItem;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for Browse {}

/// Secondary index of what is logically in the queue
///
/// Implementations may be built over any indexed store; safety under
/// concurrent `store`/`browse`/`delete_matching`/`mark_consumed` is part of
/// the contract, and counts may be eventually consistent with real broker
/// depth.
#[async_trait]
pub trait QueueView: Send + Sync + std::fmt::Debug {
    /// Idempotent insert keyed by enqueue id
    ///
    /// Storing an id the view already knows (in any state) is a no-op; in
    /// particular it never resurrects a deleted or consumed entry.
    async fn store(&self, item: EnqueuedItem) -> Result<(), ViewError>;

    /// Open a snapshot cursor over the queue's live entries
    async fn browse(&self, queue: &QueueName) -> Result<Browse, ViewError>;

    /// Tombstone every live entry matching the predicate
    ///
    /// Returns the number of entries deleted. Safe to call concurrently
    /// with ongoing browse and dequeue activity; a dequeuer that later
    /// receives the corresponding broker message observes the tombstone and
    /// skips delivery.
    async fn delete_matching(
        &self,
        queue: &QueueName,
        predicate: &(dyn for<'p> Fn(&'p EnqueuedItem) -> bool + Send + Sync),
    ) -> Result<usize, ViewError>;

    /// Count of live (non-removed) entries for the queue
    async fn get_size(&self, queue: &QueueName) -> Result<usize, ViewError>;

    /// Whether the entry was deleted by an operator
    ///
    /// Answers `false` for consumed entries: consumer acknowledgement is
    /// reconciliation, not an operator skip, and must not suppress a
    /// redelivered message that was never actually handed off.
    async fn is_deleted(&self, queue: &QueueName, id: &EnqueueId) -> Result<bool, ViewError>;

    /// Reconcile an entry the broker has confirmed consumed
    async fn mark_consumed(&self, queue: &QueueName, id: &EnqueueId) -> Result<(), ViewError>;

    /// Garbage-collect tombstoned and consumed entries
    ///
    /// Returns the number of entries removed. Intended to be called once
    /// the corresponding broker messages are known settled or expired.
    async fn prune(&self, queue: &QueueName) -> Result<usize, ViewError>;
}
