/// Item images: upload, list, delete and set-primary
use crate::{
    error::{MediaError, MediaResult},
    media::{
        presign_pair, process_blocking, roll_back, ArtifactKeys, ImageProcessor, MediaSettings,
        PendingObjects, PrimaryInvariantEnforcer,
    },
    metadata::{
        DisplayOrder, ImageId, ImageRecord, ItemId, MetadataStore, NewImage,
    },
    object_store::ObjectStore,
    permissions::{Permission, PermissionGate, Scope, UserId},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// An image upload as received from the caller
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub is_primary: bool,
    /// Raw requested position, validated before any write; defaults to 0
    pub display_order: Option<i64>,
}

/// An image record with freshly presigned URLs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    #[serde(flatten)]
    pub record: ImageRecord,
    pub url: String,
    pub thumbnail_url: String,
}

/// Orchestrates item image operations across the gate and both stores
#[derive(Clone)]
pub struct ItemImageService {
    gate: PermissionGate,
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    processor: Arc<dyn ImageProcessor>,
    settings: MediaSettings,
}

impl ItemImageService {
    pub fn new(
        gate: PermissionGate,
        objects: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        processor: Arc<dyn ImageProcessor>,
        settings: MediaSettings,
    ) -> Self {
        Self {
            gate,
            objects,
            metadata,
            processor,
            settings,
        }
    }

    /// Upload an image and register it against `item_id`
    ///
    /// Returns only once the metadata row has committed. On any failure after
    /// the first object write, the written objects are deleted before the
    /// error is returned; objects that could not be deleted are listed in the
    /// error's compensation failures.
    pub async fn upload(
        &self,
        user_id: UserId,
        item_id: ItemId,
        upload: ImageUpload,
    ) -> MediaResult<ImageRecord> {
        self.gate
            .require(user_id, Permission::ManageItems, Scope::Global)
            .await?;

        let display_order = match upload.display_order {
            Some(value) => DisplayOrder::try_from(value)?,
            None => DisplayOrder::default(),
        };

        self.require_item(item_id).await?;

        let processed = process_blocking(&self.processor, upload.data).await?;
        if upload.is_primary && !self.processor.is_square(processed.width, processed.height) {
            return Err(MediaError::Validation(
                "primary image must be square".to_string(),
            ));
        }

        let keys = ArtifactKeys::for_item(item_id, &processed.content_type);
        let content_type = processed.content_type;
        let mut pending =
            PendingObjects::new(Arc::clone(&self.objects), self.settings.compensation_timeout);

        // Tracked before each put so a write cut off by cancellation is still
        // reclaimed. A put that reports failure wrote nothing.
        pending.track(keys.original.as_str());
        if let Err(e) = self
            .objects
            .put_object(&keys.original, processed.original, &content_type)
            .await
        {
            pending.release(&keys.original);
            return Err(pending.abort(e).await);
        }

        pending.track(keys.thumbnail.as_str());
        if let Err(e) = self
            .objects
            .put_object(&keys.thumbnail, processed.thumbnail, &content_type)
            .await
        {
            pending.release(&keys.thumbnail);
            return Err(pending.abort(e).await);
        }

        let image = NewImage {
            item_id,
            original_key: keys.original,
            thumbnail_key: keys.thumbnail,
            content_type,
            display_order,
            width: processed.width,
            height: processed.height,
            uploaded_by: user_id,
        };

        let record = match self.register(&image, upload.is_primary).await {
            Ok(record) => record,
            Err(e) => return Err(pending.abort(e).await),
        };
        pending.commit();

        info!(
            item_id,
            image_id = record.id,
            is_primary = record.is_primary,
            "uploaded item image"
        );
        Ok(record)
    }

    /// Images of an item with presigned URLs, in display order
    pub async fn list(&self, user_id: UserId, item_id: ItemId) -> MediaResult<Vec<ImageView>> {
        self.gate
            .require(user_id, Permission::ViewItems, Scope::Global)
            .await?;
        self.require_item(item_id).await?;

        self.metadata
            .list_images(item_id)
            .await?
            .into_iter()
            .map(|record| {
                let (url, thumbnail_url) = presign_pair(
                    self.objects.as_ref(),
                    &record.original_key,
                    &record.thumbnail_key,
                    self.settings.presign_ttl,
                )?;
                Ok(ImageView {
                    record,
                    url,
                    thumbnail_url,
                })
            })
            .collect()
    }

    /// Delete an image's objects, then its metadata row
    ///
    /// If the row deletion fails after the objects are gone, the row is left
    /// referencing missing objects; the keys are logged for reconciliation.
    pub async fn delete(&self, user_id: UserId, item_id: ItemId, image_id: ImageId) -> MediaResult<()> {
        self.gate
            .require(user_id, Permission::ManageItems, Scope::Global)
            .await?;

        let record = self.owned_image(item_id, image_id).await?;

        self.objects.delete_object(&record.original_key).await?;
        if let Err(e) = self.objects.delete_object(&record.thumbnail_key).await {
            error!(
                item_id,
                image_id,
                original_key = %record.original_key,
                error = %e,
                "original deleted but thumbnail delete failed; metadata row references a missing object"
            );
            return Err(e);
        }

        match self.metadata.delete_image(item_id, image_id).await {
            Ok(true) => {
                info!(item_id, image_id, "deleted item image");
                Ok(())
            }
            Ok(false) => Err(MediaError::NotFound(format!(
                "Image {} not found for item {}",
                image_id, item_id
            ))),
            Err(e) => {
                error!(
                    item_id,
                    image_id,
                    original_key = %record.original_key,
                    thumbnail_key = %record.thumbnail_key,
                    error = %e,
                    "image objects deleted but metadata row remains"
                );
                Err(e)
            }
        }
    }

    /// Make an existing square image the item's only primary
    pub async fn set_primary(
        &self,
        user_id: UserId,
        item_id: ItemId,
        image_id: ImageId,
    ) -> MediaResult<ImageRecord> {
        self.gate
            .require(user_id, Permission::ManageItems, Scope::Global)
            .await?;

        let mut record = self.owned_image(item_id, image_id).await?;
        PrimaryInvariantEnforcer::ensure_eligible(&record, item_id)?;
        if record.is_primary {
            return Ok(record);
        }

        let mut tx = self.metadata.begin().await?;
        if let Err(e) = PrimaryInvariantEnforcer::promote(tx.as_mut(), item_id, image_id).await {
            roll_back(tx).await;
            return Err(e);
        }
        tx.commit().await?;

        record.is_primary = true;
        info!(item_id, image_id, "set primary item image");
        Ok(record)
    }

    async fn require_item(&self, item_id: ItemId) -> MediaResult<()> {
        if self.metadata.item_exists(item_id).await? {
            Ok(())
        } else {
            Err(MediaError::NotFound(format!("Item {} not found", item_id)))
        }
    }

    async fn owned_image(&self, item_id: ItemId, image_id: ImageId) -> MediaResult<ImageRecord> {
        match self.metadata.get_image(image_id).await? {
            Some(record) if record.item_id == item_id => Ok(record),
            _ => Err(MediaError::NotFound(format!(
                "Image {} not found for item {}",
                image_id, item_id
            ))),
        }
    }

    async fn register(&self, image: &NewImage, primary: bool) -> MediaResult<ImageRecord> {
        let mut tx = self.metadata.begin().await?;
        match PrimaryInvariantEnforcer::insert(tx.as_mut(), image, primary).await {
            Ok(record) => {
                tx.commit().await?;
                Ok(record)
            }
            Err(e) => {
                roll_back(tx).await;
                Err(e)
            }
        }
    }
}
