use std::sync::Arc;

use serde::Deserialize;

use crate::{backends::FileBlobStore, backends::MemoryBlobStore, store::BlobStore};

/// Configuration for the blob store backend
///
/// Allows runtime selection of the backing implementation through
/// configuration files.
///
/// # Examples
///
/// File-backed store in RON config:
/// ```ron
/// Missive (
///     blobs: File(
///         path: "/var/lib/missive/blobs",
///     ),
/// )
/// ```
///
/// Memory-backed store with a capacity limit:
/// ```ron
/// Missive (
///     blobs: Memory(
///         capacity: 1000,
///     ),
/// )
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum BlobConfig {
    /// File-based store (production)
    File(FileBlobStore),
    /// Memory-based store (testing/development)
    Memory(MemoryBlobConfig),
}

/// Configuration for the memory-backed store
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemoryBlobConfig {
    /// Maximum number of distinct blobs to store (omit for unlimited)
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self::File(FileBlobStore::default())
    }
}

impl BlobConfig {
    /// Get the filesystem path for file-backed stores, if applicable
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File(store) => Some(store.path()),
            Self::Memory(_) => None,
        }
    }

    /// Convert the configuration into an initialized backing store
    ///
    /// For file-backed stores this creates and validates the directory.
    pub fn into_store(self) -> crate::Result<Arc<dyn BlobStore>> {
        match self {
            Self::File(store) => {
                store.init()?;
                Ok(Arc::new(store))
            }
            Self::Memory(config) => Ok(config.capacity.map_or_else(
                || Arc::new(MemoryBlobStore::new()) as Arc<dyn BlobStore>,
                |capacity| Arc::new(MemoryBlobStore::with_capacity(capacity)),
            )),
        }
    }
}
