/// Media upload consistency engine
///
/// Coordinates the permission gate, the object store and the metadata store
/// so that metadata never references a missing object. Object writes happen
/// before the metadata transaction; when a later step fails the written
/// objects are compensated.

pub mod compensation;
pub mod groups;
pub mod items;
pub mod keys;
pub mod primary;
pub mod processor;

pub use compensation::PendingObjects;
pub use groups::{GroupLogoService, LogoView, ReplacedLogo};
pub use items::{ImageUpload, ImageView, ItemImageService};
pub use keys::ArtifactKeys;
pub use primary::PrimaryInvariantEnforcer;
pub use processor::{ImageProcessor, ProcessedImage, ThumbnailProcessor};

use crate::{
    config::MediaConfig,
    error::{MediaError, MediaResult},
    metadata::MetadataTransaction,
    object_store::{ObjectStore, PresignMethod},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Tunables shared by the media services
#[derive(Debug, Clone, Copy)]
pub struct MediaSettings {
    /// Lifetime of presigned read URLs
    pub presign_ttl: Duration,
    /// Bound on each compensating delete
    pub compensation_timeout: Duration,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            presign_ttl: Duration::from_secs(3600),
            compensation_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&MediaConfig> for MediaSettings {
    fn from(config: &MediaConfig) -> Self {
        Self {
            presign_ttl: config.presign_ttl(),
            compensation_timeout: config.compensation_timeout(),
        }
    }
}

/// Run the processor on the blocking pool
async fn process_blocking(
    processor: &Arc<dyn ImageProcessor>,
    data: Vec<u8>,
) -> MediaResult<ProcessedImage> {
    let processor = Arc::clone(processor);
    tokio::task::spawn_blocking(move || processor.process(&data))
        .await
        .map_err(|e| MediaError::Internal(format!("Image processing task failed: {}", e)))?
}

/// Roll back, logging rather than surfacing a failed rollback
async fn roll_back(tx: Box<dyn MetadataTransaction>) {
    if let Err(e) = tx.rollback().await {
        error!(error = %e, "failed to roll back metadata transaction");
    }
}

/// Presigned GET URLs for an original/thumbnail pair
fn presign_pair(
    store: &dyn ObjectStore,
    original_key: &str,
    thumbnail_key: &str,
    ttl: Duration,
) -> MediaResult<(String, String)> {
    Ok((
        store.presigned_url(PresignMethod::Get, original_key, ttl)?,
        store.presigned_url(PresignMethod::Get, thumbnail_key, ttl)?,
    ))
}
