/// Presigned object serving
use crate::{
    context::AppContext,
    error::{MediaError, MediaResult},
    object_store::PresignMethod,
};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

/// Build object routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/objects/*key", get(get_object))
}

#[derive(Debug, Deserialize)]
pub struct PresignedParams {
    pub method: String,
    pub expires: i64,
    pub signature: String,
}

/// Serve an object named by a presigned GET URL
///
/// Only URLs minted for GET are honored here; the signature and expiry are
/// checked before the store is touched.
async fn get_object(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
    Query(params): Query<PresignedParams>,
) -> MediaResult<Response> {
    if params.method != PresignMethod::Get.as_str() {
        return Err(MediaError::PermissionDenied(format!(
            "URL was not signed for GET: {}",
            params.method
        )));
    }

    ctx.signer
        .verify(PresignMethod::Get, &key, params.expires, &params.signature)?;

    let object = ctx
        .object_store
        .get_object(&key)
        .await?
        .ok_or_else(|| MediaError::NotFound(format!("Object not found: {}", key)))?;

    // Caches must not outlive the signature
    let max_age = (params.expires - chrono::Utc::now().timestamp()).max(0);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, object.content_type)
        .header(header::CONTENT_LENGTH, object.data.len().to_string())
        .header(header::CACHE_CONTROL, format!("private, max-age={}", max_age))
        .body(Body::from(object.data))
        .map_err(|e| MediaError::Internal(format!("Failed to build response: {}", e)))
}
