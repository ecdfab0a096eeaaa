//! Error types for the missive-blob crate.

use std::io;

use thiserror::Error;

use crate::id::BlobId;

/// Top-level blob store error type.
#[derive(Debug, Error)]
pub enum BlobError {
    /// I/O operation failed (file read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No content is stored under the identifier. The blob was evicted or
    /// never committed; retrying the read cannot succeed.
    #[error("Blob not found: {0}")]
    NotFound(BlobId),

    /// Store directory validation failed.
    #[error("Blob store validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error (lock poisoning, capacity, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlobError {
    /// Returns `true` if the identifier has no backing content.
    ///
    /// Consumers treat this as a poison condition: redelivery will not make
    /// the content reappear.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Store directory validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Store path does not exist.
    #[error("Blob store path does not exist: {0}")]
    PathNotFound(String),

    /// Store path is not a directory.
    #[error("Blob store path is not a directory: {0}")]
    NotDirectory(String),

    /// Store path is malformed or potentially dangerous.
    #[error("Invalid blob store path: {0}")]
    InvalidPath(String),
}

/// Specialized `Result` type for blob store operations.
pub type Result<T> = std::result::Result<T, BlobError>;

// Convenience conversion for lock poisoning
impl<T> From<std::sync::PoisonError<T>> for BlobError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let blob_err: BlobError = io_err.into();
        assert!(matches!(blob_err, BlobError::Io(_)));
        assert!(blob_err.to_string().contains("access denied"));
    }

    #[test]
    fn test_not_found_classification() {
        let err = BlobError::NotFound(BlobId::of(b"gone"));
        assert!(err.is_not_found());

        let err = BlobError::Internal("oops".to_string());
        assert!(!err.is_not_found());
    }
}
