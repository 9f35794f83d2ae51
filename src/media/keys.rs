/// Object key derivation
use crate::{metadata::ItemId, permissions::GroupId};
use uuid::Uuid;

/// Extension implied by a content type
pub fn extension_for(content_type: &str) -> &'static str {
    if content_type == "image/png" {
        "png"
    } else {
        "jpg"
    }
}

/// Keys for the two artifacts of one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    pub original: String,
    pub thumbnail: String,
}

impl ArtifactKeys {
    /// `items/{item}/{token}.{ext}` and `items/{item}/{token}_thumb.{ext}`
    pub fn for_item(item_id: ItemId, content_type: &str) -> Self {
        Self::under(&format!("items/{}", item_id), content_type)
    }

    /// `groups/{group}/logo/{token}.{ext}` and its `_thumb` sibling
    pub fn for_group_logo(group_id: GroupId, content_type: &str) -> Self {
        Self::under(&format!("groups/{}/logo", group_id), content_type)
    }

    fn under(prefix: &str, content_type: &str) -> Self {
        let token = Uuid::new_v4().simple();
        let ext = extension_for(content_type);
        Self {
            original: format!("{}/{}.{}", prefix, token, ext),
            thumbnail: format!("{}/{}_thumb.{}", prefix, token, ext),
        }
    }
}
