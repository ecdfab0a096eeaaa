//! Broker boundary: the durable at-least-once messaging substrate
//!
//! The queue publishes encoded mail references to one logical queue per
//! name and consumes them back with explicit settlement: `ack` on a
//! successful handoff, `reject` without requeue on poison, and nothing at
//! all on a crash, which leaves the message unacknowledged and eligible for
//! redelivery. No specific wire protocol is assumed.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;

use crate::name::QueueName;

/// Errors surfaced by the broker boundary.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The named queue has never seen a publish.
    #[error("Queue not found: {0}")]
    QueueNotFound(QueueName),

    /// The receipt does not correspond to an in-flight delivery.
    #[error("Unknown delivery receipt: {0}")]
    UnknownReceipt(u64),

    /// The broker is unreachable or refusing work.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),
}

/// Handle identifying one delivery of one message
///
/// Settling (`ack`/`reject`) requires the receipt, so a consumer's decision
/// always maps back to the exact broker delivery it received.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Receipt {
    queue: QueueName,
    delivery_tag: u64,
}

impl Receipt {
    #[must_use]
    pub const fn queue(&self) -> &QueueName {
        &self.queue
    }

    #[must_use]
    pub const fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }
}

/// One received, not-yet-settled message
#[derive(Debug)]
pub struct BrokerMessage {
    pub payload: Arc<[u8]>,
    pub receipt: Receipt,
}

/// The at-least-once durable messaging substrate
#[async_trait]
pub trait Broker: Send + Sync + std::fmt::Debug {
    /// Publish a payload to the named queue. Returning `Ok` is the
    /// durability commit point: the broker now holds the message.
    async fn publish(&self, queue: &QueueName, payload: Vec<u8>)
    -> std::result::Result<(), BrokerError>;

    /// Receive the next message from the named queue, waiting until one is
    /// available. The message stays in flight until settled.
    async fn receive(&self, queue: &QueueName)
    -> std::result::Result<BrokerMessage, BrokerError>;

    /// Settle a delivery as successfully handed off.
    async fn ack(&self, receipt: &Receipt) -> std::result::Result<(), BrokerError>;

    /// Settle a delivery as failed. With `requeue` the message becomes
    /// available again immediately; without it the message is dropped
    /// (dead-lettered), which is how poison messages leave the system.
    async fn reject(&self, receipt: &Receipt, requeue: bool)
    -> std::result::Result<(), BrokerError>;
}

#[derive(Debug, Default)]
struct QueueState {
    ready: Mutex<VecDeque<(u64, Arc<[u8]>)>>,
    inflight: DashMap<u64, Arc<[u8]>>,
    notify: Notify,
}

/// In-process broker implementation
///
/// Holds per-queue ready deques and in-flight maps; safe for concurrent
/// publish and consume across any number of logical queues. Durability is
/// process-lifetime only, which makes it suitable for tests and for
/// embedding the queue where an external broker is not available.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    queues: Arc<DashMap<QueueName, Arc<QueueState>>>,
    next_tag: Arc<AtomicU64>,
}

impl MemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, queue: &QueueName) -> Arc<QueueState> {
        Arc::clone(&self.queues.entry(queue.clone()).or_default())
    }

    fn existing_state(&self, queue: &QueueName) -> std::result::Result<Arc<QueueState>, BrokerError> {
        self.queues
            .get(queue)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BrokerError::QueueNotFound(queue.clone()))
    }

    /// Number of messages ready for delivery on the named queue
    #[must_use]
    pub fn depth(&self, queue: &QueueName) -> usize {
        self.queues.get(queue).map_or(0, |state| {
            state
                .ready
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .len()
        })
    }

    /// Number of delivered but unsettled messages on the named queue
    #[must_use]
    pub fn inflight(&self, queue: &QueueName) -> usize {
        self.queues.get(queue).map_or(0, |state| state.inflight.len())
    }

    /// Return every unsettled message to the front of the ready deque
    ///
    /// Simulates a consumer crash: whatever was received but never settled
    /// becomes deliverable again, exactly the broker's at-least-once
    /// redelivery behavior.
    pub fn redeliver_inflight(&self, queue: &QueueName) {
        if let Some(state) = self.queues.get(queue) {
            let tags: Vec<u64> = state.inflight.iter().map(|e| *e.key()).collect();
            let mut ready = state
                .ready
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for tag in tags {
                if let Some((tag, payload)) = state.inflight.remove(&tag) {
                    ready.push_front((tag, payload));
                }
            }
            drop(ready);
            state.notify.notify_waiters();
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(
        &self,
        queue: &QueueName,
        payload: Vec<u8>,
    ) -> std::result::Result<(), BrokerError> {
        let state = self.state(queue);
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed);

        state
            .ready
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back((tag, Arc::from(payload)));
        state.notify.notify_one();

        debug!(queue = %queue, tag, "Published message");

        Ok(())
    }

    async fn receive(
        &self,
        queue: &QueueName,
    ) -> std::result::Result<BrokerMessage, BrokerError> {
        let state = self.state(queue);

        loop {
            let next = state
                .ready
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop_front();

            if let Some((tag, payload)) = next {
                state.inflight.insert(tag, payload.clone());
                return Ok(BrokerMessage {
                    payload,
                    receipt: Receipt {
                        queue: queue.clone(),
                        delivery_tag: tag,
                    },
                });
            }

            state.notify.notified().await;
        }
    }

    async fn ack(&self, receipt: &Receipt) -> std::result::Result<(), BrokerError> {
        let state = self.existing_state(&receipt.queue)?;
        state
            .inflight
            .remove(&receipt.delivery_tag)
            .ok_or(BrokerError::UnknownReceipt(receipt.delivery_tag))?;

        debug!(queue = %receipt.queue, tag = receipt.delivery_tag, "Acknowledged message");

        Ok(())
    }

    async fn reject(
        &self,
        receipt: &Receipt,
        requeue: bool,
    ) -> std::result::Result<(), BrokerError> {
        let state = self.existing_state(&receipt.queue)?;
        let (tag, payload) = state
            .inflight
            .remove(&receipt.delivery_tag)
            .ok_or(BrokerError::UnknownReceipt(receipt.delivery_tag))?;

        if requeue {
            state
                .ready
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push_front((tag, payload));
            state.notify.notify_one();
            debug!(queue = %receipt.queue, tag, "Requeued message");
        } else {
            debug!(queue = %receipt.queue, tag, "Dropped rejected message");
        }

        Ok(())
    }
}
