use serde::Deserialize;

const fn default_publish_timeout() -> u64 {
    30
}

const fn default_max_inflight_publishes() -> usize {
    64
}

/// Configuration for one mail queue
///
/// Timeouts bound the waits on the broker; an elapsed timeout surfaces as a
/// retriable failure to the caller, never as a silently dropped mail.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Maximum time to wait for a broker publish acknowledgement (in seconds)
    ///
    /// Default: 30 seconds
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,

    /// Maximum time to wait for a message when dequeuing (in seconds)
    ///
    /// Omit to wait indefinitely.
    #[serde(default)]
    pub receive_timeout_secs: Option<u64>,

    /// Maximum number of concurrent in-flight broker publishes
    ///
    /// Bounds the connection/worker pool fronting the broker channel so a
    /// flood of producers cannot grow resource use without limit.
    ///
    /// Default: 64
    #[serde(default = "default_max_inflight_publishes")]
    pub max_inflight_publishes: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            publish_timeout_secs: default_publish_timeout(),
            receive_timeout_secs: None,
            max_inflight_publishes: default_max_inflight_publishes(),
        }
    }
}
