/// In-memory object storage backend
use crate::{
    error::MediaResult,
    object_store::{validate_key, ObjectStore, PresignMethod, StoredObject, UrlSigner},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Keeps objects in a shared map; contents are lost on restart
#[derive(Clone)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    signer: UrlSigner,
}

impl MemoryObjectStore {
    pub fn new(signer: UrlSigner) -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            signer,
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// All stored keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> MediaResult<()> {
        validate_key(key)?;
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> MediaResult<Option<StoredObject>> {
        validate_key(key)?;
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn delete_object(&self, key: &str) -> MediaResult<()> {
        validate_key(key)?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> MediaResult<bool> {
        validate_key(key)?;
        Ok(self.objects.read().await.contains_key(key))
    }

    fn presigned_url(&self, method: PresignMethod, key: &str, ttl: Duration) -> MediaResult<String> {
        validate_key(key)?;
        self.signer.sign(method, key, ttl)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryObjectStore {
        MemoryObjectStore::new(UrlSigner::new(
            "0123456789abcdef0123456789abcdef",
            "http://media.local",
        ))
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = store();
        store
            .put_object("items/1/a.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();

        let object = store.get_object("items/1/a.png").await.unwrap().unwrap();
        assert_eq!(object.content_type, "image/png");
        assert_eq!(store.keys().await, vec!["items/1/a.png".to_string()]);

        store.delete_object("items/1/a.png").await.unwrap();
        assert!(store.is_empty().await);
        store.delete_object("items/1/a.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_clones_share_contents() {
        let store = store();
        let other = store.clone();
        store
            .put_object("groups/1/logo.jpg", b"jpg".to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert!(other.exists("groups/1/logo.jpg").await.unwrap());
        assert_eq!(other.len().await, 1);
    }
}
