/// Group logos: replace, get and remove
///
/// A group holds at most one logo as two key fields. A replacement writes the
/// new pair, swaps the keys in one transaction, and only then reclaims the
/// previous pair.
use crate::{
    error::{CompensationFailure, MediaError, MediaResult},
    media::{
        compensation::reclaim, presign_pair, process_blocking, roll_back, ArtifactKeys,
        ImageProcessor, MediaSettings, PendingObjects,
    },
    metadata::{GroupLogo, LogoKeys, MetadataStore},
    object_store::ObjectStore,
    permissions::{GroupId, Permission, PermissionGate, Scope, UserId},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// The current logo of a group with presigned URLs
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoView {
    pub group_id: GroupId,
    #[serde(flatten)]
    pub keys: LogoKeys,
    pub url: String,
    pub thumbnail_url: String,
}

/// Outcome of a successful replacement
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacedLogo {
    pub logo: LogoView,
    /// Previous logo objects that could not be deleted
    pub reclaim_failures: Vec<CompensationFailure>,
}

#[derive(Clone)]
pub struct GroupLogoService {
    gate: PermissionGate,
    objects: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    processor: Arc<dyn ImageProcessor>,
    settings: MediaSettings,
}

impl GroupLogoService {
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

    /// Install a new square logo for `group_id`
    ///
    /// If the key swap fails the previous logo stays intact and only the new
    /// objects are compensated. Once the swap commits, failing to delete the
    /// previous objects is reported in `reclaim_failures` and does not fail
    /// the request.
    pub async fn replace(
        &self,
        user_id: UserId,
        group_id: GroupId,
        data: Vec<u8>,
    ) -> MediaResult<ReplacedLogo> {
        self.gate
            .require(user_id, Permission::ManageGroupUsers, Scope::ScopedTo(group_id))
            .await?;

        let previous = self.require_group(group_id).await?.logo;

        let processed = process_blocking(&self.processor, data).await?;
        if !self.processor.is_square(processed.width, processed.height) {
            return Err(MediaError::Validation(
                "group logo must be square".to_string(),
            ));
        }

        let keys = ArtifactKeys::for_group_logo(group_id, &processed.content_type);
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

        let replacement = LogoKeys {
            original_key: keys.original,
            thumbnail_key: keys.thumbnail,
        };

        if let Err(e) = self
            .swap(group_id, previous.as_ref(), Some(&replacement))
            .await
        {
            return Err(pending.abort(e).await);
        }
        pending.commit();

        let reclaim_failures = match previous {
            Some(old) => self.reclaim_logo(old).await,
            None => Vec::new(),
        };

        info!(
            group_id,
            original_key = %replacement.original_key,
            leaked = reclaim_failures.len(),
            "replaced group logo"
        );

        Ok(ReplacedLogo {
            logo: self.view(group_id, replacement)?,
            reclaim_failures,
        })
    }

    /// Current logo, or `None` when the group has none
    pub async fn get(&self, user_id: UserId, group_id: GroupId) -> MediaResult<Option<LogoView>> {
        self.gate
            .require(user_id, Permission::ViewGroups, Scope::ScopedTo(group_id))
            .await?;

        self.require_group(group_id)
            .await?
            .logo
            .map(|keys| self.view(group_id, keys))
            .transpose()
    }

    /// Clear the logo fields, then delete the objects they referenced
    pub async fn remove(
        &self,
        user_id: UserId,
        group_id: GroupId,
    ) -> MediaResult<Vec<CompensationFailure>> {
        self.gate
            .require(user_id, Permission::ManageGroupUsers, Scope::ScopedTo(group_id))
            .await?;

        let Some(previous) = self.require_group(group_id).await?.logo else {
            return Ok(Vec::new());
        };

        self.swap(group_id, Some(&previous), None).await?;
        let failures = self.reclaim_logo(previous).await;

        info!(group_id, leaked = failures.len(), "removed group logo");
        Ok(failures)
    }

    async fn require_group(&self, group_id: GroupId) -> MediaResult<GroupLogo> {
        self.metadata
            .get_group_logo(group_id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Group {} not found", group_id)))
    }

    async fn swap(
        &self,
        group_id: GroupId,
        expected: Option<&LogoKeys>,
        replacement: Option<&LogoKeys>,
    ) -> MediaResult<()> {
        let mut tx = self.metadata.begin().await?;
        if let Err(e) = tx.swap_group_logo(group_id, expected, replacement).await {
            roll_back(tx).await;
            return Err(e);
        }
        tx.commit().await
    }

    async fn reclaim_logo(&self, keys: LogoKeys) -> Vec<CompensationFailure> {
        reclaim(
            Arc::clone(&self.objects),
            vec![keys.original_key, keys.thumbnail_key],
            self.settings.compensation_timeout,
        )
        .await
    }

    fn view(&self, group_id: GroupId, keys: LogoKeys) -> MediaResult<LogoView> {
        let (url, thumbnail_url) = presign_pair(
            self.objects.as_ref(),
            &keys.original_key,
            &keys.thumbnail_key,
            self.settings.presign_ttl,
        )?;
        Ok(LogoView {
            group_id,
            keys,
            url,
            thumbnail_url,
        })
    }
}
