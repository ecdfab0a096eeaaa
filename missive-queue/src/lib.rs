//! The durable mail transfer queue
//!
//! Accepted-for-delivery mail survives process and broker restarts and is
//! handed back out at-least-once. Three sources of truth are reconciled
//! here: the broker's delivery semantics, the content-addressed blob store
//! holding message bytes, and the operator-facing queue view.
//!
//! - [`Enqueuer`]: the write path - store bytes, publish a reference, index
//!   the result in the view
//! - [`Dequeuer`]: the read path - receive, resolve bytes, honor view
//!   deletions, yield the mail
//! - [`QueueView`]: browse/count/delete queued items without consuming them
//!   from the broker
//! - [`MailQueue`]: the three assembled under one queue name

pub mod broker;
pub mod config;
pub mod dequeuer;
pub mod enqueuer;
pub mod error;
pub mod name;
pub mod queue;
pub mod reference;
pub mod view;

pub use broker::{Broker, BrokerError, BrokerMessage, MemoryBroker, Receipt};
pub use config::QueueConfig;
pub use dequeuer::{DEQUEUED_METRIC_PREFIX, DequeuedMail, Dequeuer};
pub use enqueuer::{ENQUEUED_METRIC_PREFIX, Enqueuer};
pub use error::{QueueError, Result};
pub use name::QueueName;
pub use queue::MailQueue;
pub use reference::{CodecError, MailReference, MailReferenceCodec};
pub use view::{Browse, EnqueuedItem, MemoryQueueView, Predicate, QueueView, ViewError};
