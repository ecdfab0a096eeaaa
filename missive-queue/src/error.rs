//! Typed error handling for queue operations.
//!
//! The taxonomy distinguishes:
//! - Retriable infrastructure failures (broker unreachable, store timeout) -
//!   the operation failed cleanly and may be retried
//! - Poison conditions (undecodable reference, permanently missing blob) -
//!   retrying can never succeed

use thiserror::Error;

use missive_blob::BlobError;

use crate::{broker::BrokerError, reference::CodecError, view::ViewError};

/// Top-level mail queue error type.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Blob store operation failed.
    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    /// Mail reference could not be encoded or decoded.
    #[error("Reference codec error: {0}")]
    Codec(#[from] CodecError),

    /// Broker operation failed.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Queue view operation failed.
    #[error("Queue view error: {0}")]
    View(#[from] ViewError),

    /// A bounded wait on the broker or blob store elapsed.
    #[error("Timed out after {secs}s waiting for {operation}")]
    Timeout {
        operation: &'static str,
        secs: u64,
    },
}

impl QueueError {
    /// Returns `true` if the item itself can never be processed, no matter
    /// how often it is redelivered.
    #[must_use]
    pub const fn is_poison(&self) -> bool {
        match self {
            Self::Blob(e) => e.is_not_found(),
            Self::Codec(e) => e.is_decode(),
            _ => false,
        }
    }

    /// Returns `true` if the failure is a transient infrastructure
    /// condition the caller may retry.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        match self {
            Self::Broker(_) | Self::View(_) | Self::Timeout { .. } => true,
            Self::Blob(e) => !e.is_not_found(),
            Self::Codec(_) => false,
        }
    }
}

/// Specialized `Result` type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use missive_blob::BlobId;

    use super::*;

    #[test]
    fn test_missing_blob_is_poison() {
        let err = QueueError::Blob(BlobError::NotFound(BlobId::of(b"gone")));
        assert!(err.is_poison());
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_io_blob_error_is_retriable() {
        let err = QueueError::Blob(BlobError::Internal("store busy".to_string()));
        assert!(!err.is_poison());
        assert!(err.is_retriable());
    }

    #[test]
    fn test_decode_failure_is_poison() {
        let decode_err = serde_json::from_slice::<crate::reference::MailReference>(b"not json")
            .expect_err("malformed payload");
        let err = QueueError::Codec(CodecError::Decode(decode_err));
        assert!(err.is_poison());
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_timeout_is_retriable() {
        let err = QueueError::Timeout {
            operation: "publish",
            secs: 30,
        };
        assert!(err.is_retriable());
        assert!(!err.is_poison());
    }
}
