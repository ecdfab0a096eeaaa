//! The write path: store, publish, index

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use missive_blob::MailPartsStore;
use missive_common::{EnqueueId, Mail, MetricsSink};

use crate::{
    broker::{Broker, BrokerError},
    config::QueueConfig,
    error::{QueueError, Result},
    name::QueueName,
    reference::{MailReference, MailReferenceCodec},
    view::{EnqueuedItem, QueueView},
};

/// Counter name prefix for successful enqueues, suffixed with the queue name
pub const ENQUEUED_METRIC_PREFIX: &str = "enqueuedMails:";

/// Admits mails to the queue durably
///
/// One enqueuer per queue name; safe to share across any number of
/// concurrent producers. Correctness under concurrency comes from the
/// idempotence of blob saves and the uniqueness of enqueue ids, not from
/// locking.
#[derive(Debug)]
pub struct Enqueuer {
    name: QueueName,
    broker: Arc<dyn Broker>,
    store: MailPartsStore,
    view: Arc<dyn QueueView>,
    metrics: Arc<dyn MetricsSink>,
    publish_permits: Arc<Semaphore>,
    publish_timeout: Duration,
    metric_name: String,
}

impl Enqueuer {
    #[must_use]
    pub fn new(
        name: QueueName,
        broker: Arc<dyn Broker>,
        store: MailPartsStore,
        view: Arc<dyn QueueView>,
        metrics: Arc<dyn MetricsSink>,
        config: &QueueConfig,
    ) -> Self {
        let metric_name = format!("{ENQUEUED_METRIC_PREFIX}{name}");
        Self {
            name,
            broker,
            store,
            view,
            metrics,
            publish_permits: Arc::new(Semaphore::new(config.max_inflight_publishes)),
            publish_timeout: Duration::from_secs(config.publish_timeout_secs),
            metric_name,
        }
    }

    /// Durably admit one mail to the queue
    ///
    /// Stores the mail's header and body blocks, publishes an encoded
    /// reference to the broker, and indexes the result in the queue view.
    /// The broker acknowledgement is the durability commit point: a failure
    /// before it leaves no partial state visible to consumers, and a view
    /// indexing failure after it merely leaves the view lagging until
    /// reconciled - the mail is still delivered.
    #[tracing::instrument(level = tracing::Level::DEBUG, skip(self, mail), fields(queue = %self.name, mail = mail.name()))]
    pub async fn enqueue(&self, mail: &Mail) -> Result<EnqueuedItem> {
        let enqueue_id = EnqueueId::generate();

        // Failure here aborts before anything is published
        let parts = self.store.save_parts(mail.header(), mail.body()).await?;

        let reference = MailReference::from_mail(enqueue_id, mail, parts.clone());
        let payload = MailReferenceCodec::encode(&reference)?;

        self.publish(payload).await?;

        let item = EnqueuedItem::new(enqueue_id, self.name.clone(), mail, Utc::now(), parts);

        // The broker already holds the mail; an indexing failure only makes
        // the view lag, it must not fail the enqueue.
        if let Err(e) = self.view.store(item.clone()).await {
            warn!(
                id = %enqueue_id,
                error = %e,
                "Queue view indexing failed after publish, view lags until reconciled"
            );
        }

        self.metrics.increment(&self.metric_name);
        debug!(id = %enqueue_id, "Enqueued mail");

        Ok(item)
    }

    /// Publish under a bounded permit and a bounded wait
    async fn publish(&self, payload: Vec<u8>) -> Result<()> {
        let _permit = self
            .publish_permits
            .acquire()
            .await
            .map_err(|_| BrokerError::Unavailable("publish pool closed".to_string()))?;

        tokio::time::timeout(self.publish_timeout, self.broker.publish(&self.name, payload))
            .await
            .map_err(|_| QueueError::Timeout {
                operation: "publish",
                secs: self.publish_timeout.as_secs(),
            })??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use missive_blob::{BlobStore, MemoryBlobStore};
    use missive_common::InMemoryMetrics;

    use crate::{broker::MemoryBroker, view::MemoryQueueView};

    use super::*;

    fn mail() -> Mail {
        Mail::builder()
            .sender("a@x")
            .recipient("b@y")
            .header(&b"Subject: hi\r\n"[..])
            .body(&b"hello"[..])
            .build()
    }

    struct Fixture {
        broker: MemoryBroker,
        blobs: Arc<MemoryBlobStore>,
        view: Arc<MemoryQueueView>,
        metrics: InMemoryMetrics,
        enqueuer: Enqueuer,
    }

    fn fixture(blobs: MemoryBlobStore) -> Fixture {
        let broker = MemoryBroker::new();
        let blobs = Arc::new(blobs);
        let view = Arc::new(MemoryQueueView::new());
        let metrics = InMemoryMetrics::new();

        let enqueuer = Enqueuer::new(
            QueueName::new("outbound"),
            Arc::new(broker.clone()),
            MailPartsStore::new(blobs.clone()),
            view.clone(),
            Arc::new(metrics.clone()),
            &QueueConfig::default(),
        );

        Fixture {
            broker,
            blobs,
            view,
            metrics,
            enqueuer,
        }
    }

    #[tokio::test]
    async fn test_enqueue_stores_publishes_and_indexes() {
        let fx = fixture(MemoryBlobStore::new());
        let queue = QueueName::new("outbound");

        let item = fx.enqueuer.enqueue(&mail()).await.expect("enqueue");

        assert_eq!(fx.broker.depth(&queue), 1);
        assert_eq!(fx.view.get_size(&queue).await.expect("size"), 1);
        assert!(fx.blobs.contains(&item.parts.body).await.expect("contains"));
        assert_eq!(fx.metrics.get("enqueuedMails:outbound"), 1);
    }

    #[tokio::test]
    async fn test_blob_failure_publishes_nothing() {
        // Zero capacity makes the first distinct save fail
        let fx = fixture(MemoryBlobStore::with_capacity(0));
        let queue = QueueName::new("outbound");

        let result = fx.enqueuer.enqueue(&mail()).await;
        assert!(result.is_err());

        assert_eq!(fx.broker.depth(&queue), 0);
        assert_eq!(fx.view.get_size(&queue).await.expect("size"), 0);
        assert_eq!(fx.metrics.get("enqueuedMails:outbound"), 0);
    }

    #[tokio::test]
    async fn test_each_enqueue_gets_fresh_id() {
        let fx = fixture(MemoryBlobStore::new());

        let first = fx.enqueuer.enqueue(&mail()).await.expect("enqueue");
        let second = fx.enqueuer.enqueue(&mail()).await.expect("enqueue");

        // Byte-identical content, distinct enqueue attempts
        assert_ne!(first.enqueue_id, second.enqueue_id);
        assert_eq!(first.parts, second.parts);
        assert_eq!(fx.blobs.len(), 2, "header and body stored once each");
    }

    #[tokio::test]
    async fn test_concurrent_enqueues() {
        let fx = fixture(MemoryBlobStore::new());
        let enqueuer = Arc::new(fx.enqueuer);
        let queue = QueueName::new("outbound");

        let mut handles = vec![];
        for _ in 0..20 {
            let enqueuer = enqueuer.clone();
            handles.push(tokio::spawn(async move { enqueuer.enqueue(&mail()).await }));
        }
        for handle in handles {
            handle.await.expect("task panicked").expect("enqueue failed");
        }

        assert_eq!(fx.broker.depth(&queue), 20);
        assert_eq!(fx.view.get_size(&queue).await.expect("size"), 20);
        assert_eq!(fx.metrics.get("enqueuedMails:outbound"), 20);
    }
}
