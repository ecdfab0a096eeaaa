//! The read path: receive, resolve, filter, yield

use std::{sync::Arc, time::Duration};

use tracing::{debug, warn};

use missive_blob::{BlobError, MailPartsStore};
use missive_common::{EnqueueId, Mail, MetricsSink};

use crate::{
    broker::{Broker, Receipt},
    config::QueueConfig,
    error::{QueueError, Result},
    name::QueueName,
    reference::{MailReference, MailReferenceCodec},
    view::QueueView,
};

/// Counter name prefix for successful dequeues, suffixed with the queue name
pub const DEQUEUED_METRIC_PREFIX: &str = "dequeuedMails:";

/// A mail handed out for delivery, awaiting settlement
///
/// Carries the enqueue id of the original attempt so the caller's eventual
/// `complete`/`requeue` maps back to the same broker message. An unsettled
/// `DequeuedMail` (consumer crash) leaves the broker message unacknowledged
/// and eligible for redelivery.
#[derive(Debug)]
pub struct DequeuedMail {
    mail: Mail,
    enqueue_id: EnqueueId,
    receipt: Receipt,
    broker: Arc<dyn Broker>,
    view: Arc<dyn QueueView>,
}

impl DequeuedMail {
    #[must_use]
    pub const fn mail(&self) -> &Mail {
        &self.mail
    }

    #[must_use]
    pub const fn enqueue_id(&self) -> EnqueueId {
        self.enqueue_id
    }

    /// Settle as successfully handed off: acknowledge the broker message and
    /// reconcile the queue view.
    pub async fn complete(self) -> Result<()> {
        self.broker.ack(&self.receipt).await?;
        self.view
            .mark_consumed(self.receipt.queue(), &self.enqueue_id)
            .await?;
        Ok(())
    }

    /// Settle as not processed: the message becomes deliverable again.
    pub async fn requeue(self) -> Result<()> {
        self.broker.reject(&self.receipt, true).await?;
        Ok(())
    }
}

/// Retrieves mails from the queue for delivery
///
/// Safe to share across concurrent delivery workers; each `dequeue` call
/// yields a distinct broker delivery.
#[derive(Debug)]
pub struct Dequeuer {
    name: QueueName,
    broker: Arc<dyn Broker>,
    store: MailPartsStore,
    view: Arc<dyn QueueView>,
    metrics: Arc<dyn MetricsSink>,
    receive_timeout: Option<Duration>,
    metric_name: String,
}

impl Dequeuer {
    #[must_use]
    pub fn new(
        name: QueueName,
        broker: Arc<dyn Broker>,
        store: MailPartsStore,
        view: Arc<dyn QueueView>,
        metrics: Arc<dyn MetricsSink>,
        config: &QueueConfig,
    ) -> Self {
        let metric_name = format!("{DEQUEUED_METRIC_PREFIX}{name}");
        Self {
            name,
            broker,
            store,
            view,
            metrics,
            receive_timeout: config.receive_timeout_secs.map(Duration::from_secs),
            metric_name,
        }
    }

    /// Retrieve the next deliverable mail
    ///
    /// Blocks until a mail is available (bounded by the configured receive
    /// timeout, which surfaces as a retriable failure). Items deleted
    /// through the queue view are acknowledged and skipped without being
    /// yielded; poison items (undecodable reference, permanently missing
    /// blob) are rejected without requeue and skipped. Neither stalls
    /// delivery of subsequent messages.
    #[tracing::instrument(level = tracing::Level::DEBUG, skip(self), fields(queue = %self.name))]
    pub async fn dequeue(&self) -> Result<DequeuedMail> {
        loop {
            let message = self.receive().await?;

            let reference = match MailReferenceCodec::decode(&message.payload) {
                Ok(reference) => reference,
                Err(e) => {
                    warn!(error = %e, "Rejecting undecodable mail reference");
                    self.broker.reject(&message.receipt, false).await?;
                    continue;
                }
            };

            // An operator delete must prevent delivery even when the broker
            // already queued the message
            if self
                .view
                .is_deleted(&self.name, &reference.enqueue_id)
                .await?
            {
                debug!(id = %reference.enqueue_id, "Skipping mail deleted via queue view");
                self.broker.ack(&message.receipt).await?;
                continue;
            }

            let (header, body) = match self.store.read_parts(&reference.parts).await {
                Ok(parts) => parts,
                Err(e @ BlobError::NotFound(_)) => {
                    warn!(
                        id = %reference.enqueue_id,
                        error = %e,
                        "Rejecting mail whose content is gone from the blob store"
                    );
                    self.broker.reject(&message.receipt, false).await?;
                    continue;
                }
                // Transient store failure: leave the message unacknowledged
                // for natural redelivery and surface the error
                Err(e) => return Err(e.into()),
            };

            let enqueue_id = reference.enqueue_id;
            let mail = Self::rebuild_mail(reference, header, body);

            self.metrics.increment(&self.metric_name);
            debug!(id = %enqueue_id, "Dequeued mail");

            return Ok(DequeuedMail {
                mail,
                enqueue_id,
                receipt: message.receipt,
                broker: self.broker.clone(),
                view: self.view.clone(),
            });
        }
    }

    async fn receive(&self) -> Result<crate::broker::BrokerMessage> {
        match self.receive_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.broker.receive(&self.name))
                .await
                .map_err(|_| QueueError::Timeout {
                    operation: "receive",
                    secs: timeout.as_secs(),
                })?
                .map_err(Into::into),
            None => self.broker.receive(&self.name).await.map_err(Into::into),
        }
    }

    fn rebuild_mail(
        reference: MailReference,
        header: Arc<[u8]>,
        body: Arc<[u8]>,
    ) -> Mail {
        let mut builder = Mail::builder()
            .name(reference.name)
            .sender(reference.sender)
            .recipients(reference.recipients)
            .state(reference.state)
            .header(header)
            .body(body);

        for (key, value) in reference.attributes {
            builder = builder.attribute(key, value);
        }

        builder.build()
    }
}
