use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::{
    error::{BlobError, Result},
    id::BlobId,
    store::BlobStore,
};

/// File-based blob store implementation
///
/// Each blob is a single file named by its content digest:
/// `{digest}.blob`. The digest grammar (64 lowercase hex characters) makes
/// filenames safe by construction; nothing user-controlled ever reaches the
/// filesystem layer.
///
/// # Atomicity
/// Writes go to a `.tmp_` prefixed file first and are renamed into place,
/// so a crash mid-write never leaves a partially written blob visible. Two
/// concurrent writers of identical content may both stage a temp file; the
/// renames target the same name with the same bytes, so the race is
/// harmless and at most one physical blob remains.
///
/// # Idempotence
/// Saving content whose blob file already exists skips the write entirely.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    path: PathBuf,
}

impl Default for FileBlobStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/lib/missive/blobs"),
        }
    }
}

// Custom Deserialize implementation with path validation
impl<'de> Deserialize<'de> for FileBlobStore {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct FileBlobStoreHelper {
            path: PathBuf,
        }

        let helper = FileBlobStoreHelper::deserialize(deserializer)?;
        Self::validate_path(&helper.path).map_err(serde::de::Error::custom)?;

        Ok(Self { path: helper.path })
    }
}

impl FileBlobStore {
    /// Validate a store path for safety
    ///
    /// Rejects paths with `..` components, relative paths, and paths inside
    /// sensitive system directories.
    fn validate_path(path: &Path) -> anyhow::Result<()> {
        for component in path.components() {
            if component == std::path::Component::ParentDir {
                return Err(anyhow::anyhow!(
                    "Blob store path cannot contain '..' components: {}",
                    path.display()
                ));
            }
        }

        if !path.is_absolute() {
            return Err(anyhow::anyhow!(
                "Blob store path must be absolute: {}",
                path.display()
            ));
        }

        let sensitive_prefixes = [
            "/etc",
            "/bin",
            "/sbin",
            "/usr/bin",
            "/usr/sbin",
            "/boot",
            "/sys",
            "/proc",
            "/dev",
        ];

        for prefix in &sensitive_prefixes {
            if path.starts_with(prefix) {
                return Err(anyhow::anyhow!(
                    "Blob store path cannot be in system directory {}: {}",
                    prefix,
                    path.display()
                ));
            }
        }

        Ok(())
    }

    /// Create a new `FileBlobStore` builder
    #[must_use]
    pub fn builder() -> FileBlobStoreBuilder {
        FileBlobStoreBuilder::default()
    }

    /// The store's directory
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Initialize the file-backed store
    ///
    /// Creates the directory if it doesn't exist and validates that the
    /// path is actually a directory. Call during application startup to
    /// fail fast on permission problems.
    pub fn init(&self) -> Result<()> {
        let path = Path::new(&self.path);
        if !path.try_exists()? {
            debug!(path = %self.path.display(), "Blob store directory does not exist, creating");
            std::fs::create_dir_all(path)?;
        } else if !path.is_dir() {
            return Err(crate::ValidationError::NotDirectory(
                path.display().to_string(),
            )
            .into());
        }

        Ok(())
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        self.path.join(format!("{id}.blob"))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    /// Write content to disk under its digest, skipping if already present
    ///
    /// 1. Compute the digest (pure function of the bytes)
    /// 2. If `{digest}.blob` exists, the content is already committed
    /// 3. Otherwise write to `.tmp_{digest}.blob`, then atomically rename
    #[tracing::instrument(level = tracing::Level::DEBUG, skip(self, data))]
    async fn save(&self, data: &[u8]) -> Result<BlobId> {
        let id = BlobId::of(data);
        let blob_path = self.blob_path(&id);

        if fs::try_exists(&blob_path).await.unwrap_or(false) {
            debug!(id = %id, "Blob already stored, skipping write");
            return Ok(id);
        }

        let temp_path = self.path.join(format!(".tmp_{id}.blob"));

        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, &blob_path).await?;

        debug!(id = %id, size = data.len(), "Stored blob");

        Ok(id)
    }

    #[tracing::instrument(level = tracing::Level::DEBUG, skip(self), fields(id = %id))]
    async fn read(&self, id: &BlobId) -> Result<Arc<[u8]>> {
        match fs::read(self.blob_path(id)).await {
            Ok(bytes) => Ok(Arc::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, id: &BlobId) -> Result<bool> {
        Ok(fs::try_exists(self.blob_path(id)).await?)
    }
}

/// Builder for `FileBlobStore`
#[derive(Debug, Default)]
pub struct FileBlobStoreBuilder {
    path: PathBuf,
}

impl FileBlobStoreBuilder {
    /// Set the store directory path
    #[must_use]
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Build the final `FileBlobStore`
    ///
    /// # Errors
    /// Returns an error if the path is invalid or potentially dangerous
    pub fn build(self) -> anyhow::Result<FileBlobStore> {
        FileBlobStore::validate_path(&self.path)?;
        Ok(FileBlobStore { path: self.path })
    }
}
