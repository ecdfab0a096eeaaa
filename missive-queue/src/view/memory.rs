use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use missive_common::EnqueueId;

use crate::name::QueueName;

use super::{Browse, EnqueuedItem, QueueView, ViewError};

/// Lifecycle state of one view entry
///
/// `Live` entries are what browse and size report. `Deleted` marks an
/// operator removal and suppresses delivery of the corresponding broker
/// message. `Consumed` marks broker-confirmed consumption. Both terminal
/// states linger until pruned so that late broker redeliveries can still be
/// classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Live,
    Deleted,
    Consumed,
}

#[derive(Debug, Clone)]
struct Entry {
    item: EnqueuedItem,
    state: EntryState,
}

/// In-memory queue view implementation
///
/// Entries live in a lock-free concurrent map keyed by enqueue id, which is
/// globally unique across queues. Suitable for tests and single-process
/// deployments; a durable deployment backs the same trait with an indexed
/// external store.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueView {
    entries: Arc<DashMap<EnqueueId, Entry>>,
}

impl MemoryQueueView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueView for MemoryQueueView {
    async fn store(&self, item: EnqueuedItem) -> Result<(), ViewError> {
        self.entries.entry(item.enqueue_id).or_insert(Entry {
            item,
            state: EntryState::Live,
        });
        Ok(())
    }

    async fn browse(&self, queue: &QueueName) -> Result<Browse, ViewError> {
        let items = self
            .entries
            .iter()
            .filter(|entry| {
                entry.value().state == EntryState::Live && entry.value().item.queue_name == *queue
            })
            .map(|entry| entry.value().item.clone())
            .collect();

        Ok(Browse::new(items))
    }

    async fn delete_matching(
        &self,
        queue: &QueueName,
        predicate: &(dyn for<'p> Fn(&'p EnqueuedItem) -> bool + Send + Sync),
    ) -> Result<usize, ViewError> {
        let mut deleted = 0;

        for mut entry in self.entries.iter_mut() {
            let value = entry.value_mut();
            if value.state == EntryState::Live
                && value.item.queue_name == *queue
                && predicate(&value.item)
            {
                value.state = EntryState::Deleted;
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn get_size(&self, queue: &QueueName) -> Result<usize, ViewError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| {
                entry.value().state == EntryState::Live && entry.value().item.queue_name == *queue
            })
            .count())
    }

    async fn is_deleted(&self, _queue: &QueueName, id: &EnqueueId) -> Result<bool, ViewError> {
        Ok(self
            .entries
            .get(id)
            .is_some_and(|entry| entry.value().state == EntryState::Deleted))
    }

    async fn mark_consumed(&self, _queue: &QueueName, id: &EnqueueId) -> Result<(), ViewError> {
        if let Some(mut entry) = self.entries.get_mut(id)
            && entry.value().state == EntryState::Live
        {
            entry.value_mut().state = EntryState::Consumed;
        }
        Ok(())
    }

    async fn prune(&self, queue: &QueueName) -> Result<usize, ViewError> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            entry.item.queue_name != *queue || entry.state == EntryState::Live
        });
        Ok(before - self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use missive_blob::{BlobId, BlobPartsId};
    use missive_common::Mail;

    use super::*;

    fn queue() -> QueueName {
        QueueName::new("outbound")
    }

    fn item(recipient: &str) -> EnqueuedItem {
        let mail = Mail::builder()
            .sender("a@x")
            .recipient(recipient)
            .build();
        EnqueuedItem::new(
            EnqueueId::generate(),
            queue(),
            &mail,
            Utc::now(),
            BlobPartsId {
                header: BlobId::of(b"header"),
                body: BlobId::of(b"body"),
            },
        )
    }

    #[tokio::test]
    async fn test_store_and_browse() {
        let view = MemoryQueueView::new();

        view.store(item("b@y")).await.expect("store");
        view.store(item("c@z")).await.expect("store");

        let browsed: Vec<_> = view.browse(&queue()).await.expect("browse").collect();
        assert_eq!(browsed.len(), 2);
        assert_eq!(view.get_size(&queue()).await.expect("size"), 2);
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let view = MemoryQueueView::new();
        let entry = item("b@y");

        view.store(entry.clone()).await.expect("store");
        view.store(entry.clone()).await.expect("store again");

        assert_eq!(view.get_size(&queue()).await.expect("size"), 1);
    }

    #[tokio::test]
    async fn test_store_does_not_resurrect_deleted() {
        let view = MemoryQueueView::new();
        let entry = item("b@y");

        view.store(entry.clone()).await.expect("store");
        view.delete_matching(&queue(), &|_| true).await.expect("delete");

        view.store(entry.clone()).await.expect("store again");
        assert!(
            view.is_deleted(&queue(), &entry.enqueue_id)
                .await
                .expect("is_deleted")
        );
        assert_eq!(view.get_size(&queue()).await.expect("size"), 0);
    }

    #[tokio::test]
    async fn test_delete_matching_predicate() {
        let view = MemoryQueueView::new();
        view.store(item("b@y")).await.expect("store");
        view.store(item("c@z")).await.expect("store");

        let deleted = view
            .delete_matching(&queue(), &|item| {
                item.recipients.contains(&"b@y".to_string())
            })
            .await
            .expect("delete");

        assert_eq!(deleted, 1);
        assert_eq!(view.get_size(&queue()).await.expect("size"), 1);
    }

    #[tokio::test]
    async fn test_consumed_is_not_deleted() {
        let view = MemoryQueueView::new();
        let entry = item("b@y");
        view.store(entry.clone()).await.expect("store");

        view.mark_consumed(&queue(), &entry.enqueue_id)
            .await
            .expect("mark consumed");

        assert!(
            !view
                .is_deleted(&queue(), &entry.enqueue_id)
                .await
                .expect("is_deleted")
        );
        assert_eq!(view.get_size(&queue()).await.expect("size"), 0);
    }

    #[tokio::test]
    async fn test_operator_delete_wins_over_consume() {
        let view = MemoryQueueView::new();
        let entry = item("b@y");
        view.store(entry.clone()).await.expect("store");

        view.delete_matching(&queue(), &|_| true).await.expect("delete");
        view.mark_consumed(&queue(), &entry.enqueue_id)
            .await
            .expect("mark consumed");

        assert!(
            view.is_deleted(&queue(), &entry.enqueue_id)
                .await
                .expect("is_deleted")
        );
    }

    #[tokio::test]
    async fn test_browse_is_snapshot() {
        let view = MemoryQueueView::new();
        view.store(item("b@y")).await.expect("store");
        view.store(item("c@z")).await.expect("store");

        let cursor = view.browse(&queue()).await.expect("browse");

        // Mutations after the call do not affect the open cursor
        view.delete_matching(&queue(), &|_| true).await.expect("delete");
        view.store(item("d@w")).await.expect("store");

        assert_eq!(cursor.count(), 2);
    }

    #[tokio::test]
    async fn test_browse_ordered_by_enqueue_time() {
        let view = MemoryQueueView::new();

        let mut first = item("b@y");
        first.enqueued_at = Utc::now() - chrono::Duration::seconds(60);
        let second = item("c@z");

        // Stored out of order
        view.store(second.clone()).await.expect("store");
        view.store(first.clone()).await.expect("store");

        let browsed: Vec<_> = view.browse(&queue()).await.expect("browse").collect();
        assert_eq!(browsed[0].enqueue_id, first.enqueue_id);
        assert_eq!(browsed[1].enqueue_id, second.enqueue_id);
    }

    #[tokio::test]
    async fn test_prune_removes_settled_entries() {
        let view = MemoryQueueView::new();
        let consumed = item("b@y");
        let deleted = item("c@z");
        let live = item("d@w");

        view.store(consumed.clone()).await.expect("store");
        view.store(deleted.clone()).await.expect("store");
        view.store(live.clone()).await.expect("store");

        view.mark_consumed(&queue(), &consumed.enqueue_id)
            .await
            .expect("mark consumed");
        view.delete_matching(&queue(), &|item| item.enqueue_id == deleted.enqueue_id)
            .await
            .expect("delete");

        let pruned = view.prune(&queue()).await.expect("prune");
        assert_eq!(pruned, 2);
        assert_eq!(view.get_size(&queue()).await.expect("size"), 1);
    }
}
