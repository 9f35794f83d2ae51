/// Object storage
///
/// Binary artifacts (originals and thumbnails) live here under derived keys.
/// Supports multiple backend implementations (disk, in-memory).

pub mod disk;
pub mod memory;
pub mod presign;

pub use disk::DiskObjectStore;
pub use memory::MemoryObjectStore;
pub use presign::{PresignMethod, UrlSigner};

use crate::error::{MediaError, MediaResult};
use async_trait::async_trait;
use std::time::Duration;

/// An object read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Object storage backend trait
///
/// Clients are shared across requests and must be safe for unbounded
/// concurrent use. `delete_object` succeeds when the key is already absent.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object under `key`, replacing any previous content
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> MediaResult<()>;

    /// Retrieve an object
    async fn get_object(&self, key: &str) -> MediaResult<Option<StoredObject>>;

    /// Delete an object
    async fn delete_object(&self, key: &str) -> MediaResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> MediaResult<bool>;

    /// Mint a time-limited URL for `key`; never persisted
    fn presigned_url(&self, method: PresignMethod, key: &str, ttl: Duration) -> MediaResult<String>;

    fn backend_name(&self) -> &'static str;
}

/// Reject keys that could escape the store's namespace
pub fn validate_key(key: &str) -> MediaResult<()> {
    if key.is_empty() || key.len() > 1024 {
        return Err(MediaError::Storage(format!("Invalid object key length: {}", key.len())));
    }

    if key.starts_with('/') || key.contains('\\') {
        return Err(MediaError::Storage(format!("Invalid object key: {}", key)));
    }

    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(MediaError::Storage(format!("Invalid object key: {}", key)));
    }

    Ok(())
}

/// Content type implied by a key's extension
pub fn content_type_for_key(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
