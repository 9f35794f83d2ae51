/// Best-effort cleanup of objects that no committed metadata references
use crate::{
    error::{CompensationFailure, MediaError},
    object_store::ObjectStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Objects written during an operation whose metadata has not committed yet
///
/// Call `commit` once the metadata referencing them is durable, or
/// `compensate` to delete them. If the guard is dropped while still holding
/// keys (the request future was cancelled), it hands them to a background
/// task so they are still reclaimed.
pub struct PendingObjects {
    store: Arc<dyn ObjectStore>,
    keys: Vec<String>,
    timeout: Duration,
}

impl PendingObjects {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self {
            store,
            keys: Vec::new(),
            timeout,
        }
    }

    /// Record a key that has been written
    pub fn track(&mut self, key: impl Into<String>) {
        self.keys.push(key.into());
    }

    /// Stop tracking a key whose write reported failure
    pub fn release(&mut self, key: &str) {
        self.keys.retain(|tracked| tracked != key);
    }

    /// The tracked objects are now referenced by committed metadata
    pub fn commit(mut self) {
        self.keys.clear();
    }

    /// Delete every tracked object, reporting the ones that could not be removed
    pub async fn compensate(mut self) -> Vec<CompensationFailure> {
        let keys = std::mem::take(&mut self.keys);
        reclaim(Arc::clone(&self.store), keys, self.timeout).await
    }

    /// Compensate, then hand back `error` carrying any objects left behind
    pub async fn abort(self, error: MediaError) -> MediaError {
        let failures = self.compensate().await;
        error.with_compensation(failures)
    }
}

impl Drop for PendingObjects {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }

        let keys = std::mem::take(&mut self.keys);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    count = keys.len(),
                    "operation abandoned with uncommitted objects, reclaiming in background"
                );
                let store = Arc::clone(&self.store);
                let timeout = self.timeout;
                handle.spawn(async move {
                    delete_all(store, keys, timeout).await;
                });
            }
            Err(_) => {
                warn!(?keys, "no runtime available to reclaim uncommitted objects");
            }
        }
    }
}

/// Delete `keys` on a task of its own
///
/// The deletion keeps running if the caller is cancelled; each delete is
/// bounded by `timeout` rather than by the caller's deadline.
pub async fn reclaim(
    store: Arc<dyn ObjectStore>,
    keys: Vec<String>,
    timeout: Duration,
) -> Vec<CompensationFailure> {
    if keys.is_empty() {
        return Vec::new();
    }

    let task = tokio::spawn(delete_all(store, keys.clone(), timeout));
    match task.await {
        Ok(failures) => failures,
        Err(e) => keys
            .into_iter()
            .map(|key| CompensationFailure {
                key,
                reason: format!("reclaim task failed: {}", e),
            })
            .collect(),
    }
}

async fn delete_all(
    store: Arc<dyn ObjectStore>,
    keys: Vec<String>,
    timeout: Duration,
) -> Vec<CompensationFailure> {
    let mut failures = Vec::new();

    for key in keys {
        match tokio::time::timeout(timeout, store.delete_object(&key)).await {
            Ok(Ok(())) => debug!(key = %key, "reclaimed object"),
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "failed to reclaim object");
                failures.push(CompensationFailure {
                    key,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(key = %key, ?timeout, "timed out reclaiming object");
                failures.push(CompensationFailure {
                    key,
                    reason: format!("timed out after {:?}", timeout),
                });
            }
        }
    }

    failures
}
