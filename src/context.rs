/// Application context and dependency injection
use crate::{
    auth::SessionStore,
    config::{ObjectStoreConfig, ServerConfig},
    db,
    error::{MediaError, MediaResult},
    media::{GroupLogoService, ImageProcessor, ItemImageService, MediaSettings, ThumbnailProcessor},
    metadata::{MetadataStore, SqliteMetadataStore},
    object_store::{DiskObjectStore, MemoryObjectStore, ObjectStore, UrlSigner},
    permissions::{PermissionGate, SqlAuthority},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub signer: UrlSigner,
    pub object_store: Arc<dyn ObjectStore>,
    pub metadata: Arc<SqliteMetadataStore>,
    pub authority: Arc<SqlAuthority>,
    pub sessions: Arc<SessionStore>,
    pub item_images: Arc<ItemImageService>,
    pub group_logos: Arc<GroupLogoService>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> MediaResult<Self> {
        config.validate()?;

        let signer = Self::signer(&config);
        let object_store: Arc<dyn ObjectStore> = match &config.storage.object_store {
            ObjectStoreConfig::Disk { location } => {
                tokio::fs::create_dir_all(location).await.map_err(|e| {
                    MediaError::Internal(format!(
                        "Failed to create object directory {}: {}",
                        location.display(),
                        e
                    ))
                })?;
                Arc::new(DiskObjectStore::new(location.clone(), signer))
            }
            ObjectStoreConfig::Memory => Arc::new(MemoryObjectStore::new(signer)),
        };

        Self::with_object_store(config, object_store).await
    }

    /// Build the context around an already constructed object store
    pub async fn with_object_store(
        config: ServerConfig,
        object_store: Arc<dyn ObjectStore>,
    ) -> MediaResult<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.storage.data_directory)
            .await
            .map_err(|e| MediaError::Internal(format!("Failed to create data directory: {}", e)))?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::init_schema(&db).await?;
        db::test_connection(&db).await?;

        let signer = Self::signer(&config);
        let metadata = Arc::new(SqliteMetadataStore::new(db.clone()));
        let authority = Arc::new(SqlAuthority::new(db.clone()));
        let sessions = Arc::new(SessionStore::new(db.clone()));

        let gate = PermissionGate::new(authority.clone());
        let processor: Arc<dyn ImageProcessor> = Arc::new(ThumbnailProcessor::new(
            config.media.max_upload_bytes,
            config.media.thumbnail_size,
        ));
        let settings = MediaSettings::from(&config.media);
        let metadata_store: Arc<dyn MetadataStore> = metadata.clone();

        let item_images = Arc::new(ItemImageService::new(
            gate.clone(),
            object_store.clone(),
            metadata_store.clone(),
            processor.clone(),
            settings,
        ));
        let group_logos = Arc::new(GroupLogoService::new(
            gate,
            object_store.clone(),
            metadata_store,
            processor,
            settings,
        ));

        tracing::info!(
            backend = object_store.backend_name(),
            database = %config.storage.database.display(),
            "media context initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            db,
            signer,
            object_store,
            metadata,
            authority,
            sessions,
            item_images,
            group_logos,
        })
    }

    fn signer(config: &ServerConfig) -> UrlSigner {
        UrlSigner::new(
            config.media.signing_secret.clone(),
            config.service.public_url.clone(),
        )
    }
}
