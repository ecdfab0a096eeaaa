//! Injected observability sink.
//!
//! The queue reports counters through a sink passed in at construction time
//! rather than a process-wide registry; exporting them (Prometheus, OTLP,
//! logs) is the embedding application's concern.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// Counter sink the queue components report into
pub trait MetricsSink: Send + Sync + std::fmt::Debug {
    /// Increment the named counter by one
    fn increment(&self, name: &str);
}

/// Sink that discards every increment
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment(&self, _name: &str) {}
}

/// Sink that accumulates counters in memory
///
/// Useful in tests and for exposing counts over a control interface.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetrics {
    counters: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemoryMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the named counter (zero if never incremented)
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment(&self, name: &str) {
        *self
            .counters
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_counts() {
        let sink = InMemoryMetrics::new();
        assert_eq!(sink.get("enqueuedMails:spool"), 0);

        sink.increment("enqueuedMails:spool");
        sink.increment("enqueuedMails:spool");
        sink.increment("dequeuedMails:spool");

        assert_eq!(sink.get("enqueuedMails:spool"), 2);
        assert_eq!(sink.get("dequeuedMails:spool"), 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let sink = InMemoryMetrics::new();
        let clone = sink.clone();
        clone.increment("counter");
        assert_eq!(sink.get("counter"), 1);
    }
}
