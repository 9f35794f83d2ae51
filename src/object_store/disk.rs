/// Disk-based object storage backend
use crate::{
    error::{MediaError, MediaResult},
    object_store::{
        content_type_for_key, validate_key, ObjectStore, PresignMethod, StoredObject, UrlSigner,
    },
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Disk storage backend
///
/// Keys map directly onto relative paths under the base directory. Writes go
/// to a temporary sibling first and are renamed into place, so a reader never
/// sees a half-written object.
#[derive(Clone)]
pub struct DiskObjectStore {
    base_path: PathBuf,
    signer: UrlSigner,
}

impl DiskObjectStore {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf, signer: UrlSigner) -> Self {
        Self { base_path, signer }
    }

    /// Get the file path for a key
    fn object_path(&self, key: &str) -> MediaResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    /// Ensure the directory for an object exists
    async fn ensure_object_dir(&self, key: &str) -> MediaResult<PathBuf> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                MediaError::Storage(format!("Failed to create object directory: {}", e))
            })?;
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> MediaResult<()> {
        let path = self.ensure_object_dir(key).await?;
        let staging = path.with_extension(format!("{}.partial", uuid::Uuid::new_v4().simple()));

        debug!(key, bytes = data.len(), content_type, "writing object to disk");

        fs::write(&staging, data).await.map_err(|e| {
            MediaError::Storage(format!("Failed to write object {}: {}", key, e))
        })?;

        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(MediaError::Storage(format!(
                "Failed to move object {} into place: {}",
                key, e
            )));
        }

        Ok(())
    }

    async fn get_object(&self, key: &str) -> MediaResult<Option<StoredObject>> {
        let path = self.object_path(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Some(StoredObject {
                data,
                content_type: content_type_for_key(key).to_string(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MediaError::Storage(format!(
                "Failed to read object {}: {}",
                key, e
            ))),
        }
    }

    async fn delete_object(&self, key: &str) -> MediaResult<()> {
        let path = self.object_path(key)?;

        debug!(key, "deleting object from disk");

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MediaError::Storage(format!(
                "Failed to delete object {}: {}",
                key, e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> MediaResult<bool> {
        let path = self.object_path(key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| MediaError::Storage(format!("Failed to stat object {}: {}", key, e)))
    }

    fn presigned_url(&self, method: PresignMethod, key: &str, ttl: Duration) -> MediaResult<String> {
        validate_key(key)?;
        self.signer.sign(method, key, ttl)
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}
