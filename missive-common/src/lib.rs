pub mod id;
pub mod logging;
pub mod mail;
pub mod metrics;

pub use tracing;

pub use id::EnqueueId;
pub use mail::{Mail, MailBuilder};
pub use metrics::{InMemoryMetrics, MetricsSink, NoopMetrics};

/// Signal broadcast to long-running components for cooperative shutdown.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}
