//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use inventory_media::{
    db,
    error::{MediaError, MediaResult},
    media::{GroupLogoService, ItemImageService, MediaSettings, ThumbnailProcessor},
    metadata::{
        GroupLogo, ImageId, ImageRecord, ItemId, LogoKeys, MetadataStore, MetadataTransaction,
        NewImage, SqliteMetadataStore,
    },
    object_store::{MemoryObjectStore, ObjectStore, PresignMethod, StoredObject, UrlSigner},
    permissions::{AuthorizationAuthority, GroupId, Permission, PermissionGate, Scope, UserId},
};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const SECRET: &str = "0123456789abcdef0123456789abcdef";

/// Encode a blank PNG of the given size
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Object store that records calls and can be told to fail
pub struct RecordingObjectStore {
    pub inner: MemoryObjectStore,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
    /// Puts whose key contains this fragment fail
    fail_put_matching: Mutex<Option<String>>,
    /// Puts whose key contains this fragment never complete
    stall_put_matching: Mutex<Option<String>>,
    /// Puts whose key contains this fragment land in the store, then never complete
    stall_after_put_matching: Mutex<Option<String>>,
    fail_deletes: AtomicBool,
    /// Deletes whose key contains this fragment fail
    fail_delete_matching: Mutex<Option<String>>,
}

impl RecordingObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryObjectStore::new(UrlSigner::new(SECRET, "http://media.test")),
            puts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_put_matching: Mutex::new(None),
            stall_put_matching: Mutex::new(None),
            stall_after_put_matching: Mutex::new(None),
            fail_deletes: AtomicBool::new(false),
            fail_delete_matching: Mutex::new(None),
        })
    }

    pub fn fail_puts_matching(&self, fragment: &str) {
        *self.fail_put_matching.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn stall_puts_matching(&self, fragment: &str) {
        *self.stall_put_matching.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn stall_after_puts_matching(&self, fragment: &str) {
        *self.stall_after_put_matching.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes_matching(&self, fragment: &str) {
        *self.fail_delete_matching.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.put_count() + self.delete_count()
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.keys().await
    }
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> MediaResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if key_matches(&self.stall_put_matching, key) {
            std::future::pending::<()>().await;
        }
        if key_matches(&self.fail_put_matching, key) {
            return Err(MediaError::Storage(format!("injected put failure for {}", key)));
        }
        self.inner.put_object(key, data, content_type).await?;
        if key_matches(&self.stall_after_put_matching, key) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn get_object(&self, key: &str) -> MediaResult<Option<StoredObject>> {
        self.inner.get_object(key).await
    }

    async fn delete_object(&self, key: &str) -> MediaResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) || key_matches(&self.fail_delete_matching, key) {
            return Err(MediaError::Storage(format!("injected delete failure for {}", key)));
        }
        self.inner.delete_object(key).await
    }

    async fn exists(&self, key: &str) -> MediaResult<bool> {
        self.inner.exists(key).await
    }

    fn presigned_url(&self, method: PresignMethod, key: &str, ttl: Duration) -> MediaResult<String> {
        self.inner.presigned_url(method, key, ttl)
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

fn key_matches(fragment: &Mutex<Option<String>>, key: &str) -> bool {
    fragment
        .lock()
        .unwrap()
        .as_deref()
        .map(|fragment| key.contains(fragment))
        .unwrap_or(false)
}

#[derive(Default)]
struct Faults {
    begin: AtomicBool,
    insert: AtomicBool,
    commit: AtomicBool,
}

/// Metadata store wrapper that counts calls and injects transaction faults
pub struct FaultyMetadataStore {
    pub inner: SqliteMetadataStore,
    pub calls: AtomicUsize,
    pub begins: AtomicUsize,
    faults: Arc<Faults>,
    /// Logo committed by another writer right before the next transaction opens
    interleaved_logo: Mutex<Option<(GroupId, LogoKeys)>>,
}

impl FaultyMetadataStore {
    pub fn new(inner: SqliteMetadataStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
            begins: AtomicUsize::new(0),
            faults: Arc::new(Faults::default()),
            interleaved_logo: Mutex::new(None),
        })
    }

    pub fn fail_begin(&self, fail: bool) {
        self.faults.begin.store(fail, Ordering::SeqCst);
    }

    pub fn fail_insert(&self, fail: bool) {
        self.faults.insert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commit(&self, fail: bool) {
        self.faults.commit.store(fail, Ordering::SeqCst);
    }

    pub fn interleave_logo(&self, group_id: GroupId, keys: LogoKeys) {
        *self.interleaved_logo.lock().unwrap() = Some((group_id, keys));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn begin_count(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for FaultyMetadataStore {
    async fn item_exists(&self, item_id: ItemId) -> MediaResult<bool> {
        self.record();
        self.inner.item_exists(item_id).await
    }

    async fn get_image(&self, image_id: ImageId) -> MediaResult<Option<ImageRecord>> {
        self.record();
        self.inner.get_image(image_id).await
    }

    async fn list_images(&self, item_id: ItemId) -> MediaResult<Vec<ImageRecord>> {
        self.record();
        self.inner.list_images(item_id).await
    }

    async fn delete_image(&self, item_id: ItemId, image_id: ImageId) -> MediaResult<bool> {
        self.record();
        self.inner.delete_image(item_id, image_id).await
    }

    async fn get_group_logo(&self, group_id: GroupId) -> MediaResult<Option<GroupLogo>> {
        self.record();
        self.inner.get_group_logo(group_id).await
    }

    async fn begin(&self) -> MediaResult<Box<dyn MetadataTransaction>> {
        self.record();
        self.begins.fetch_add(1, Ordering::SeqCst);
        if self.faults.begin.load(Ordering::SeqCst) {
            return Err(MediaError::Internal("injected begin failure".to_string()));
        }
        let interleaved = self.interleaved_logo.lock().unwrap().take();
        if let Some((group_id, keys)) = interleaved {
            let current = self
                .inner
                .get_group_logo(group_id)
                .await?
                .and_then(|group| group.logo);
            let mut other = self.inner.begin().await?;
            other
                .swap_group_logo(group_id, current.as_ref(), Some(&keys))
                .await?;
            other.commit().await?;
        }
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyTransaction {
            inner,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct FaultyTransaction {
    inner: Box<dyn MetadataTransaction>,
    faults: Arc<Faults>,
}

#[async_trait]
impl MetadataTransaction for FaultyTransaction {
    async fn insert_image(&mut self, image: &NewImage) -> MediaResult<ImageRecord> {
        if self.faults.insert.load(Ordering::SeqCst) {
            return Err(MediaError::Internal("injected insert failure".to_string()));
        }
        self.inner.insert_image(image).await
    }

    async fn assign_primary(&mut self, item_id: ItemId, image_id: ImageId) -> MediaResult<()> {
        self.inner.assign_primary(item_id, image_id).await
    }

    async fn swap_group_logo(
        &mut self,
        group_id: GroupId,
        expected: Option<&LogoKeys>,
        replacement: Option<&LogoKeys>,
    ) -> MediaResult<()> {
        self.inner
            .swap_group_logo(group_id, expected, replacement)
            .await
    }

    async fn commit(self: Box<Self>) -> MediaResult<()> {
        if self.faults.commit.load(Ordering::SeqCst) {
            self.inner.rollback().await?;
            return Err(MediaError::Internal("injected commit failure".to_string()));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> MediaResult<()> {
        self.inner.rollback().await
    }
}

/// Authority with a fixed answer that counts how often it is asked
pub struct CountingAuthority {
    allow: AtomicBool,
    pub checks: AtomicUsize,
    pub last_scope: Mutex<Option<Scope>>,
}

impl CountingAuthority {
    pub fn new(allow: bool) -> Arc<Self> {
        Arc::new(Self {
            allow: AtomicBool::new(allow),
            checks: AtomicUsize::new(0),
            last_scope: Mutex::new(None),
        })
    }

    pub fn set_allow(&self, allow: bool) {
        self.allow.store(allow, Ordering::SeqCst);
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorizationAuthority for CountingAuthority {
    async fn check_permission(
        &self,
        _user_id: UserId,
        _permission: Permission,
        scope: Scope,
    ) -> MediaResult<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        *self.last_scope.lock().unwrap() = Some(scope);
        Ok(self.allow.load(Ordering::SeqCst))
    }
}

/// Services wired to the fakes over a throwaway database
pub struct Harness {
    pub _dir: TempDir,
    pub sqlite: SqliteMetadataStore,
    pub metadata: Arc<FaultyMetadataStore>,
    pub objects: Arc<RecordingObjectStore>,
    pub authority: Arc<CountingAuthority>,
    pub items: ItemImageService,
    pub groups: GroupLogoService,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&dir.path().join("media.sqlite"), db::DatabaseOptions::default())
            .await
            .unwrap();
        db::init_schema(&pool).await.unwrap();

        let sqlite = SqliteMetadataStore::new(pool);
        let metadata = FaultyMetadataStore::new(sqlite.clone());
        let objects = RecordingObjectStore::new();
        let authority = CountingAuthority::new(true);

        let gate = PermissionGate::new(authority.clone());
        let processor = Arc::new(ThumbnailProcessor::default());
        let settings = MediaSettings {
            presign_ttl: Duration::from_secs(3600),
            compensation_timeout: Duration::from_secs(2),
        };

        let items = ItemImageService::new(
            gate.clone(),
            objects.clone(),
            metadata.clone(),
            processor.clone(),
            settings,
        );
        let groups = GroupLogoService::new(gate, objects.clone(), metadata.clone(), processor, settings);

        Self {
            _dir: dir,
            sqlite,
            metadata,
            objects,
            authority,
            items,
            groups,
        }
    }

    /// Total calls observed by the object and metadata fakes
    pub fn side_effect_calls(&self) -> usize {
        self.objects.calls() + self.metadata.call_count()
    }
}
