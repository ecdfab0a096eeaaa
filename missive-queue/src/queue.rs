//! The assembled mail queue for one queue name

use std::sync::Arc;

use missive_blob::{BlobStore, MailPartsStore};
use missive_common::{Mail, MetricsSink};

use crate::{
    broker::Broker,
    config::QueueConfig,
    dequeuer::{DequeuedMail, Dequeuer},
    enqueuer::Enqueuer,
    error::Result,
    name::QueueName,
    view::{Browse, EnqueuedItem, Predicate, QueueView},
};

/// One logical mail queue: write path, read path, and operator surface
///
/// Producers call `enqueue`, delivery workers call `dequeue`, and
/// operational tooling browses, counts, and deletes through the queue view
/// without consuming anything from the broker.
#[derive(Debug)]
pub struct MailQueue {
    name: QueueName,
    enqueuer: Enqueuer,
    dequeuer: Dequeuer,
    view: Arc<dyn QueueView>,
}

impl MailQueue {
    #[must_use]
    pub fn new(
        name: QueueName,
        broker: Arc<dyn Broker>,
        blobs: Arc<dyn BlobStore>,
        view: Arc<dyn QueueView>,
        metrics: Arc<dyn MetricsSink>,
        config: &QueueConfig,
    ) -> Self {
        let store = MailPartsStore::new(blobs);

        let enqueuer = Enqueuer::new(
            name.clone(),
            broker.clone(),
            store.clone(),
            view.clone(),
            metrics.clone(),
            config,
        );
        let dequeuer = Dequeuer::new(
            name.clone(),
            broker,
            store,
            view.clone(),
            metrics,
            config,
        );

        Self {
            name,
            enqueuer,
            dequeuer,
            view,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &QueueName {
        &self.name
    }

    /// Durably admit one mail (see [`Enqueuer::enqueue`])
    pub async fn enqueue(&self, mail: &Mail) -> Result<EnqueuedItem> {
        self.enqueuer.enqueue(mail).await
    }

    /// Retrieve the next deliverable mail (see [`Dequeuer::dequeue`])
    pub async fn dequeue(&self) -> Result<DequeuedMail> {
        self.dequeuer.dequeue().await
    }

    /// Browse the queue's live entries without consuming from the broker
    pub async fn browse(&self) -> Result<Browse> {
        Ok(self.view.browse(&self.name).await?)
    }

    /// Delete every queued mail matching the predicate
    pub async fn delete_matching(&self, predicate: Predicate<'_>) -> Result<usize> {
        Ok(self.view.delete_matching(&self.name, predicate).await?)
    }

    /// Count of mails logically in the queue
    pub async fn size(&self) -> Result<usize> {
        Ok(self.view.get_size(&self.name).await?)
    }

    /// Garbage-collect settled view entries
    pub async fn prune(&self) -> Result<usize> {
        Ok(self.view.prune(&self.name).await?)
    }
}
