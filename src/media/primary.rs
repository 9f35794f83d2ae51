/// Single-primary-per-item invariant
///
/// The primary flag is only ever touched here, and only through an open
/// transaction, so the clear and the set always commit together.
use crate::{
    error::{MediaError, MediaResult},
    metadata::{ImageId, ImageRecord, ItemId, MetadataTransaction, NewImage},
};

pub struct PrimaryInvariantEnforcer;

impl PrimaryInvariantEnforcer {
    /// Insert a new image, making it the item's only primary when `primary` is set
    pub async fn insert(
        tx: &mut dyn MetadataTransaction,
        image: &NewImage,
        primary: bool,
    ) -> MediaResult<ImageRecord> {
        let mut record = tx.insert_image(image).await?;
        if primary {
            tx.assign_primary(record.item_id, record.id).await?;
            record.is_primary = true;
        }
        Ok(record)
    }

    /// Make an existing image the item's only primary
    pub async fn promote(
        tx: &mut dyn MetadataTransaction,
        item_id: ItemId,
        image_id: ImageId,
    ) -> MediaResult<()> {
        tx.assign_primary(item_id, image_id).await
    }

    /// Preconditions for promoting `record`, checked before any transaction opens
    pub fn ensure_eligible(record: &ImageRecord, item_id: ItemId) -> MediaResult<()> {
        if record.item_id != item_id {
            return Err(MediaError::NotFound(format!(
                "Image {} not found for item {}",
                record.id, item_id
            )));
        }
        if !record.is_square() {
            return Err(MediaError::Validation(
                "primary image must be square".to_string(),
            ));
        }
        Ok(())
    }
}
