/// Relational metadata for item images and group logos
///
/// The metadata store is the single source of truth for whether an upload
/// happened. Writes that must be atomic go through a `MetadataTransaction`.

pub mod sqlite;

pub use sqlite::SqliteMetadataStore;

use crate::{
    error::{MediaError, MediaResult},
    permissions::{GroupId, UserId},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ItemId = i64;
pub type ImageId = i64;

/// Position of an image within its item's gallery
///
/// Always a non-negative value that fits a signed 32-bit column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayOrder(u32);

impl DisplayOrder {
    pub const MAX: u32 = i32::MAX as u32;

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for DisplayOrder {
    type Error = MediaError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 || value > Self::MAX as i64 {
            return Err(MediaError::Validation(format!(
                "display_order must be between 0 and {}, got {}",
                Self::MAX,
                value
            )));
        }
        Ok(DisplayOrder(value as u32))
    }
}

/// Image attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: ImageId,
    pub item_id: ItemId,
    pub original_key: String,
    pub thumbnail_key: String,
    pub content_type: String,
    pub display_order: DisplayOrder,
    pub is_primary: bool,
    pub width: u32,
    pub height: u32,
    pub uploaded_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl ImageRecord {
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

/// Row to insert for a freshly uploaded image
///
/// Carries no primary flag: the flag is only ever set through
/// `MetadataTransaction::assign_primary`.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub item_id: ItemId,
    pub original_key: String,
    pub thumbnail_key: String,
    pub content_type: String,
    pub display_order: DisplayOrder,
    pub width: u32,
    pub height: u32,
    pub uploaded_by: UserId,
}

/// Object keys of one logo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoKeys {
    pub original_key: String,
    pub thumbnail_key: String,
}

/// Logo fields of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLogo {
    pub group_id: GroupId,
    pub logo: Option<LogoKeys>,
}

/// Read access plus transaction entry point
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn item_exists(&self, item_id: ItemId) -> MediaResult<bool>;

    async fn get_image(&self, image_id: ImageId) -> MediaResult<Option<ImageRecord>>;

    /// Images of an item ordered by display order, then id
    async fn list_images(&self, item_id: ItemId) -> MediaResult<Vec<ImageRecord>>;

    /// Remove one image row; `false` when no row matched
    async fn delete_image(&self, item_id: ItemId, image_id: ImageId) -> MediaResult<bool>;

    /// `None` when the group does not exist
    async fn get_group_logo(&self, group_id: GroupId) -> MediaResult<Option<GroupLogo>>;

    async fn begin(&self) -> MediaResult<Box<dyn MetadataTransaction>>;
}

/// Writes that commit or roll back together
///
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait MetadataTransaction: Send {
    /// Insert a non-primary image row
    async fn insert_image(&mut self, image: &NewImage) -> MediaResult<ImageRecord>;

    /// Make `image_id` the only primary image of `item_id`
    ///
    /// Clears every other primary flag of the item and sets the target's in
    /// this transaction. Fails with `NotFound` when the image does not belong
    /// to the item.
    async fn assign_primary(&mut self, item_id: ItemId, image_id: ImageId) -> MediaResult<()>;

    /// Replace a group's logo keys if they still equal `expected`
    ///
    /// Fails with `Conflict` when another writer changed the logo since
    /// `expected` was read, and with `NotFound` when the group is gone.
    async fn swap_group_logo(
        &mut self,
        group_id: GroupId,
        expected: Option<&LogoKeys>,
        replacement: Option<&LogoKeys>,
    ) -> MediaResult<()>;

    async fn commit(self: Box<Self>) -> MediaResult<()>;

    async fn rollback(self: Box<Self>) -> MediaResult<()>;
}
