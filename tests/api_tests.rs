//! HTTP surface tests driven through the router with `oneshot`

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{png, SECRET};
use inventory_media::{
    config::{
        LogFormat, LoggingConfig, MediaConfig, ObjectStoreConfig, ServerConfig, ServiceConfig,
        StorageConfig,
    },
    context::AppContext,
    metadata::MetadataStore,
    object_store::{MemoryObjectStore, UrlSigner},
    permissions::{Permission, Scope},
    server::build_router,
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const PUBLIC_URL: &str = "http://media.test";

struct TestApp {
    _dir: TempDir,
    ctx: AppContext,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                public_url: PUBLIC_URL.to_string(),
            },
            storage: StorageConfig {
                data_directory: dir.path().to_path_buf(),
                database: dir.path().join("media.sqlite"),
                object_store: ObjectStoreConfig::Memory,
            },
            media: MediaConfig {
                signing_secret: SECRET.to_string(),
                max_upload_bytes: 1024 * 1024,
                thumbnail_size: 64,
                presign_ttl_secs: 3600,
                compensation_timeout_secs: 2,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Text,
            },
        };

        let objects = Arc::new(MemoryObjectStore::new(UrlSigner::new(SECRET, PUBLIC_URL)));
        let ctx = AppContext::with_object_store(config, objects).await.unwrap();
        let router = build_router(ctx.clone());

        Self {
            _dir: dir,
            ctx,
            router,
        }
    }

    /// A session for a user holding `permissions` in `scope`
    async fn token_for(&self, user_id: i64, permissions: &[Permission], scope: Scope) -> String {
        let role = self
            .ctx
            .authority
            .create_role(&format!("role-{}", user_id), permissions)
            .await
            .unwrap();
        self.ctx.authority.assign_role(user_id, role, scope).await.unwrap();
        self.ctx
            .sessions
            .create_session(user_id, chrono::Duration::hours(1))
            .await
            .unwrap()
            .access_token
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }
}

fn upload_request(uri: &str, method: &str, token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/octet-stream");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    upload_request(uri, "GET", token, Vec::new())
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, json) = app.send_json(get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["objectStore"], "memory");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;
    let item = app.ctx.metadata.create_item("drill").await.unwrap();

    let (status, json) = app
        .send_json(upload_request(
            &format!("/items/{}/images", item),
            "POST",
            None,
            png(32, 32),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "AuthenticationRequired");

    let (status, _) = app
        .send_json(get(&format!("/items/{}/images", item), Some("not-a-session")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_list_and_fetch_presigned_object() {
    let app = TestApp::new().await;
    let item = app.ctx.metadata.create_item("drill").await.unwrap();
    let token = app
        .token_for(1, &[Permission::ManageItems, Permission::ViewItems], Scope::Global)
        .await;

    let (status, record) = app
        .send_json(upload_request(
            &format!("/items/{}/images?is_primary=true&display_order=3", item),
            "POST",
            Some(&token),
            png(300, 300),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["isPrimary"], true);
    assert_eq!(record["displayOrder"], 3);

    let (status, listing) = app
        .send_json(get(&format!("/items/{}/images", item), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let url = listing["images"][0]["url"].as_str().unwrap().to_string();
    let path = url.strip_prefix(PUBLIC_URL).unwrap();

    let response = app.router.clone().oneshot(get(path, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let max_age = cache_max_age(&response);
    assert!(max_age > 3500 && max_age <= 3600, "max-age {}", max_age);

    // Tampered signatures are refused
    let tampered = format!("{}0", path);
    let (status, _) = app.send(get(&tampered, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

fn cache_max_age(response: &axum::response::Response) -> i64 {
    response.headers()[header::CACHE_CONTROL]
        .to_str()
        .unwrap()
        .strip_prefix("private, max-age=")
        .unwrap()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_cache_lifetime_follows_url_expiry() {
    let app = TestApp::new().await;
    app.ctx
        .object_store
        .put_object("items/1/short.png", png(10, 10), "image/png")
        .await
        .unwrap();

    let url = app
        .ctx
        .signer
        .sign_until(
            inventory_media::object_store::PresignMethod::Get,
            "items/1/short.png",
            chrono::Utc::now().timestamp() + 60,
        )
        .unwrap();
    let path = url.strip_prefix(PUBLIC_URL).unwrap();

    let response = app.router.clone().oneshot(get(path, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let max_age = cache_max_age(&response);
    assert!(max_age > 0 && max_age <= 60, "max-age {}", max_age);
}

#[tokio::test]
async fn test_caller_without_role_is_forbidden() {
    let app = TestApp::new().await;
    let item = app.ctx.metadata.create_item("drill").await.unwrap();
    let token = app.token_for(2, &[Permission::ViewItems], Scope::Global).await;

    let (status, json) = app
        .send_json(upload_request(
            &format!("/items/{}/images", item),
            "POST",
            Some(&token),
            png(32, 32),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "PermissionDenied");
    assert!(app.ctx.metadata.list_images(item).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_display_order_is_bad_request() {
    let app = TestApp::new().await;
    let item = app.ctx.metadata.create_item("drill").await.unwrap();
    let token = app.token_for(1, &[Permission::ManageItems], Scope::Global).await;

    let (status, json) = app
        .send_json(upload_request(
            &format!("/items/{}/images?display_order=-1", item),
            "POST",
            Some(&token),
            png(32, 32),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "ValidationError");
}

#[tokio::test]
async fn test_set_primary_and_delete_routes() {
    let app = TestApp::new().await;
    let item = app.ctx.metadata.create_item("drill").await.unwrap();
    let token = app.token_for(1, &[Permission::ManageItems], Scope::Global).await;

    let mut ids = Vec::new();
    for primary in [true, false] {
        let (status, record) = app
            .send_json(upload_request(
                &format!("/items/{}/images?is_primary={}", item, primary),
                "POST",
                Some(&token),
                png(64, 64),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(record["id"].as_i64().unwrap());
    }

    let (status, record) = app
        .send_json(upload_request(
            &format!("/items/{}/images/{}/primary", item, ids[1]),
            "PUT",
            Some(&token),
            Vec::new(),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["isPrimary"], true);
    assert_eq!(app.ctx.metadata.count_primary(item).await.unwrap(), 1);

    let (status, _) = app
        .send(upload_request(
            &format!("/items/{}/images/{}", item, ids[0]),
            "DELETE",
            Some(&token),
            Vec::new(),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = app
        .send_json(upload_request(
            &format!("/items/{}/images/{}", item, ids[0]),
            "DELETE",
            Some(&token),
            Vec::new(),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "ResourceNotFound");
}

#[tokio::test]
async fn test_group_logo_routes_respect_group_scope() {
    let app = TestApp::new().await;
    let group = app.ctx.metadata.create_group("welders").await.unwrap();
    let other = app.ctx.metadata.create_group("painters").await.unwrap();
    let token = app
        .token_for(
            5,
            &[Permission::ManageGroupUsers, Permission::ViewGroups],
            Scope::ScopedTo(group),
        )
        .await;

    let uri = format!("/groups/{}/logo", group);

    let (status, json) = app
        .send_json(upload_request(&uri, "PUT", Some(&token), png(400, 200)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "ValidationError");

    let (status, json) = app
        .send_json(upload_request(&uri, "PUT", Some(&token), png(128, 128)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["logo"]["originalKey"]
        .as_str()
        .unwrap()
        .starts_with(&format!("groups/{}/logo/", group)));

    let (status, json) = app.send_json(get(&uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["logo"]["url"].as_str().unwrap().starts_with(PUBLIC_URL));

    let (status, _) = app
        .send_json(upload_request(
            &format!("/groups/{}/logo", other),
            "PUT",
            Some(&token),
            png(128, 128),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = app
        .send_json(upload_request(&uri, "DELETE", Some(&token), Vec::new()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["reclaimFailures"].as_array().unwrap().len(), 0);

    let (_, json) = app.send_json(get(&uri, Some(&token))).await;
    assert!(json["logo"].is_null());
}
