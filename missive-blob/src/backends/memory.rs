use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

use crate::{
    error::{BlobError, Result},
    id::BlobId,
    store::BlobStore,
};

/// In-memory blob store implementation
///
/// Content is held in a `HashMap` keyed by digest and protected by an
/// `RwLock`. Primarily intended for testing, but usable for transient
/// queues that need not survive a restart.
///
/// # Capacity Management
/// The store can be configured with a maximum number of distinct blobs.
/// Saving content that is already present never counts against the limit:
/// content addressing makes those saves no-ops.
///
/// # Concurrency
/// Uses an `RwLock` for interior mutability. Saves of identical content may
/// race; both writers observe the same identifier and the stored bytes are
/// identical either way.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<BlobId, Arc<[u8]>>>>,
    /// Maximum number of distinct blobs to store (None = unlimited)
    capacity: Option<usize>,
}

impl MemoryBlobStore {
    /// Create a new empty store with unlimited capacity
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store with a capacity limit
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
            capacity: Some(capacity),
        }
    }

    /// Number of distinct blobs currently stored
    ///
    /// Recovers gracefully if the lock is poisoned by accessing the
    /// underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the configured capacity (None = unlimited)
    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn save(&self, data: &[u8]) -> Result<BlobId> {
        let id = BlobId::of(data);

        let mut blobs = self.blobs.write()?;

        // Existing content: idempotent no-op
        if blobs.contains_key(&id) {
            return Ok(id);
        }

        if let Some(cap) = self.capacity
            && blobs.len() >= cap
        {
            return Err(BlobError::Internal(format!(
                "Memory blob store capacity exceeded: {}/{cap} blobs",
                blobs.len()
            )));
        }

        blobs.insert(id.clone(), Arc::from(data));

        Ok(id)
    }

    async fn read(&self, id: &BlobId) -> Result<Arc<[u8]>> {
        self.blobs
            .read()?
            .get(id)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(id.clone()))
    }

    async fn contains(&self, id: &BlobId) -> Result<bool> {
        Ok(self.blobs.read()?.contains_key(id))
    }
}
