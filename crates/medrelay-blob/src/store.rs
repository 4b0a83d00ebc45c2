//! Filesystem implementation of the BlobStore port

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use medrelay_core::domain::{BlobKey, SyncError};
use medrelay_core::ports::BlobStore;

/// Content-addressed blob store rooted at a directory
///
/// Files live at `<root>/<first two hex chars>/<digest>`; the two-character
/// shard keeps directories small under large queue backlogs. Writes go
/// through a temp file and an atomic rename, so a crash mid-write never
/// leaves a partial blob under a valid key.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Creates a store rooted at `root`
    ///
    /// The directory tree is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &BlobKey) -> PathBuf {
        let key = key.as_str();
        // BlobKey validation guarantees at least one hex char; digests are
        // always 64, so the split below never sees a short key in practice.
        let (shard, rest) = key.split_at(key.len().min(2));
        self.root.join(shard).join(rest)
    }
}

#[async_trait::async_trait]
impl BlobStore for FsBlobStore {
    async fn add(&self, data: &[u8]) -> Result<BlobKey, SyncError> {
        let digest = format!("{:x}", Sha256::digest(data));
        let key = BlobKey::new(digest)?;
        let path = self.path_for(&key);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::trace!(key = %key, "Blob already stored, reusing");
            return Ok(key);
        }

        let parent = path.parent().unwrap_or(&self.root);
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::store("blob", "add", Some(key.to_string()), e))?;

        // Write to a temp name first; rename is atomic within the shard dir
        let tmp = parent.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| SyncError::store("blob", "add", Some(key.to_string()), e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(SyncError::store("blob", "add", Some(key.to_string()), e));
        }

        tracing::debug!(key = %key, size = data.len(), "Blob stored");
        Ok(key)
    }

    async fn get(&self, key: &BlobKey) -> Result<Vec<u8>, SyncError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SyncError::not_found("blob", key))
            }
            Err(e) => Err(SyncError::store("blob", "get", Some(key.to_string()), e)),
        }
    }

    async fn remove(&self, key: &BlobKey) -> Result<(), SyncError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Blob removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::trace!(key = %key, "Blob already absent on remove");
                Ok(())
            }
            Err(e) => Err(SyncError::store("blob", "remove", Some(key.to_string()), e)),
        }
    }
}
