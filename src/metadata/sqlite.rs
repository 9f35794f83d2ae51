/// SQLite implementation of the metadata store
use crate::{
    error::{MediaError, MediaResult},
    metadata::{
        DisplayOrder, GroupLogo, ImageId, ImageRecord, ItemId, LogoKeys, MetadataStore,
        MetadataTransaction, NewImage,
    },
    permissions::GroupId,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};

const IMAGE_COLUMNS: &str = "id, item_id, original_key, thumbnail_key, content_type, display_order, \
     is_primary, width, height, uploaded_by, created_at";

/// Metadata store backed by a SQLite pool
///
/// Writers are serialized by SQLite. Every transaction issued here starts
/// with a write statement, so a concurrent writer waits on the busy timeout
/// instead of failing on a stale snapshot.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create_item(&self, name: &str) -> MediaResult<ItemId> {
        let result = sqlx::query("INSERT INTO items (name, created_at) VALUES (?1, ?2)")
            .bind(name)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;
        Ok(result.last_insert_rowid())
    }

    #[cfg(test)]
    pub async fn delete_item(&self, item_id: ItemId) -> MediaResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(item_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_group(&self, name: &str) -> MediaResult<GroupId> {
        let result = sqlx::query("INSERT INTO groups (name, created_at) VALUES (?1, ?2)")
            .bind(name)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Number of images of an item currently flagged primary
    pub async fn count_primary(&self, item_id: ItemId) -> MediaResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS primaries FROM item_images WHERE item_id = ?1 AND is_primary = 1",
        )
        .bind(item_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row.try_get("primaries")?)
    }
}

fn to_u32(row: &SqliteRow, column: &str) -> MediaResult<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| MediaError::Internal(format!("Column {} out of range: {}", column, value)))
}

fn row_to_image(row: &SqliteRow) -> MediaResult<ImageRecord> {
    let display_order: i64 = row.try_get("display_order")?;
    let is_primary: i64 = row.try_get("is_primary")?;

    Ok(ImageRecord {
        id: row.try_get("id")?,
        item_id: row.try_get("item_id")?,
        original_key: row.try_get("original_key")?,
        thumbnail_key: row.try_get("thumbnail_key")?,
        content_type: row.try_get("content_type")?,
        display_order: DisplayOrder::try_from(display_order)
            .map_err(|e| MediaError::Internal(e.to_string()))?,
        is_primary: is_primary != 0,
        width: to_u32(row, "width")?,
        height: to_u32(row, "height")?,
        uploaded_by: row.try_get("uploaded_by")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Surface constraint violations as conflicts rather than internal errors
fn classify(e: sqlx::Error, what: &str) -> MediaError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            MediaError::Conflict(format!("{} violates a uniqueness constraint", what))
        }
        _ => MediaError::Database(e),
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn item_exists(&self, item_id: ItemId) -> MediaResult<bool> {
        let row = sqlx::query("SELECT 1 FROM items WHERE id = ?1")
            .bind(item_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn get_image(&self, image_id: ImageId) -> MediaResult<Option<ImageRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM item_images WHERE id = ?1",
            IMAGE_COLUMNS
        ))
        .bind(image_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(row_to_image).transpose()
    }

    async fn list_images(&self, item_id: ItemId) -> MediaResult<Vec<ImageRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM item_images WHERE item_id = ?1 ORDER BY display_order ASC, id ASC",
            IMAGE_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(row_to_image).collect()
    }

    async fn delete_image(&self, item_id: ItemId, image_id: ImageId) -> MediaResult<bool> {
        let result = sqlx::query("DELETE FROM item_images WHERE id = ?1 AND item_id = ?2")
            .bind(image_id)
            .bind(item_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_group_logo(&self, group_id: GroupId) -> MediaResult<Option<GroupLogo>> {
        let row = sqlx::query("SELECT logo_key, logo_thumbnail_key FROM groups WHERE id = ?1")
            .bind(group_id)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let original_key: Option<String> = row.try_get("logo_key")?;
        let thumbnail_key: Option<String> = row.try_get("logo_thumbnail_key")?;
        let logo = match (original_key, thumbnail_key) {
            (Some(original_key), Some(thumbnail_key)) => Some(LogoKeys {
                original_key,
                thumbnail_key,
            }),
            _ => None,
        };

        Ok(Some(GroupLogo { group_id, logo }))
    }

    async fn begin(&self) -> MediaResult<Box<dyn MetadataTransaction>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(SqliteMetadataTransaction { tx }))
    }
}

/// An open SQLite transaction
pub struct SqliteMetadataTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl MetadataTransaction for SqliteMetadataTransaction {
    async fn insert_image(&mut self, image: &NewImage) -> MediaResult<ImageRecord> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO item_images
                (item_id, original_key, thumbnail_key, content_type, display_order,
                 is_primary, width, height, uploaded_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(image.item_id)
        .bind(&image.original_key)
        .bind(&image.thumbnail_key)
        .bind(&image.content_type)
        .bind(image.display_order.get() as i64)
        .bind(image.width as i64)
        .bind(image.height as i64)
        .bind(image.uploaded_by)
        .bind(created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "image insert"))?;

        Ok(ImageRecord {
            id: result.last_insert_rowid(),
            item_id: image.item_id,
            original_key: image.original_key.clone(),
            thumbnail_key: image.thumbnail_key.clone(),
            content_type: image.content_type.clone(),
            display_order: image.display_order,
            is_primary: false,
            width: image.width,
            height: image.height,
            uploaded_by: image.uploaded_by,
            created_at,
        })
    }

    async fn assign_primary(&mut self, item_id: ItemId, image_id: ImageId) -> MediaResult<()> {
        // Two statements: the partial unique index is checked row by row, so
        // the old primary must be cleared before the new one is set.
        sqlx::query(
            "UPDATE item_images SET is_primary = 0 WHERE item_id = ?1 AND is_primary = 1 AND id <> ?2",
        )
        .bind(item_id)
        .bind(image_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "primary clear"))?;

        let result = sqlx::query("UPDATE item_images SET is_primary = 1 WHERE id = ?1 AND item_id = ?2")
            .bind(image_id)
            .bind(item_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| classify(e, "primary assignment"))?;

        if result.rows_affected() == 0 {
            return Err(MediaError::NotFound(format!(
                "Image {} of item {}",
                image_id, item_id
            )));
        }

        Ok(())
    }

    async fn swap_group_logo(
        &mut self,
        group_id: GroupId,
        expected: Option<&LogoKeys>,
        replacement: Option<&LogoKeys>,
    ) -> MediaResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE groups
            SET logo_key = ?2, logo_thumbnail_key = ?3
            WHERE id = ?1 AND logo_key IS ?4 AND logo_thumbnail_key IS ?5
            "#,
        )
        .bind(group_id)
        .bind(replacement.map(|k| k.original_key.as_str()))
        .bind(replacement.map(|k| k.thumbnail_key.as_str()))
        .bind(expected.map(|k| k.original_key.as_str()))
        .bind(expected.map(|k| k.thumbnail_key.as_str()))
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists = sqlx::query("SELECT 1 FROM groups WHERE id = ?1")
            .bind(group_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .is_some();

        if exists {
            Err(MediaError::Conflict(format!(
                "Logo of group {} changed concurrently",
                group_id
            )))
        } else {
            Err(MediaError::NotFound(format!("Group {}", group_id)))
        }
    }

    async fn commit(self: Box<Self>) -> MediaResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MediaResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
