use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::Result,
    id::{BlobId, BlobPartsId},
};

/// Content-addressed byte storage
///
/// `save` is idempotent: the identifier is a pure function of the content,
/// so re-saving identical bytes is a no-op write and concurrent saves of the
/// same content race harmlessly to the same identifier. No guarantees exist
/// beyond idempotent put; there are no transactions.
#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Store the content, returning its content-derived identifier
    async fn save(&self, data: &[u8]) -> Result<BlobId>;

    /// Read the content stored under the identifier
    ///
    /// Fails with [`crate::BlobError::NotFound`] when nothing is stored
    /// under it.
    async fn read(&self, id: &BlobId) -> Result<Arc<[u8]>>;

    /// Check whether content is stored under the identifier
    async fn contains(&self, id: &BlobId) -> Result<bool>;
}

/// Store for the two blocks of a mail: MIME header and body
///
/// A thin composition over a [`BlobStore`] that keeps the two blocks
/// independently addressed, so mails sharing either block share its storage.
#[derive(Debug, Clone)]
pub struct MailPartsStore {
    store: Arc<dyn BlobStore>,
}

impl MailPartsStore {
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Save a mail's header and body blocks
    pub async fn save_parts(&self, header: &[u8], body: &[u8]) -> Result<BlobPartsId> {
        let header = self.store.save(header).await?;
        let body = self.store.save(body).await?;
        Ok(BlobPartsId { header, body })
    }

    /// Resolve a parts identifier back to (header, body) bytes
    pub async fn read_parts(&self, parts: &BlobPartsId) -> Result<(Arc<[u8]>, Arc<[u8]>)> {
        let header = self.store.read(&parts.header).await?;
        let body = self.store.read(&parts.body).await?;
        Ok((header, body))
    }

    /// The underlying blob store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBlobStore;

    #[tokio::test]
    async fn test_parts_round_trip() {
        let store = MailPartsStore::new(Arc::new(MemoryBlobStore::new()));

        let parts = store
            .save_parts(b"Subject: hi\r\n", b"hello")
            .await
            .expect("save");
        let (header, body) = store.read_parts(&parts).await.expect("read");

        assert_eq!(header.as_ref(), b"Subject: hi\r\n");
        assert_eq!(body.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_shared_body_distinct_headers() {
        let store = MailPartsStore::new(Arc::new(MemoryBlobStore::new()));

        let first = store.save_parts(b"Subject: a\r\n", b"same body").await.expect("save");
        let second = store.save_parts(b"Subject: b\r\n", b"same body").await.expect("save");

        assert_ne!(first.header, second.header);
        assert_eq!(first.body, second.body);
    }
}
