/// Item image endpoints
use crate::{
    auth::Caller,
    context::AppContext,
    error::MediaResult,
    media::{ImageUpload, ImageView},
    metadata::{ImageId, ImageRecord, ItemId},
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build item image routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/items/:item_id/images", get(list_images).post(upload_image))
        .route("/items/:item_id/images/:image_id", axum::routing::delete(delete_image))
        .route("/items/:item_id/images/:image_id/primary", put(set_primary))
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    #[serde(default)]
    pub is_primary: bool,
    pub display_order: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ImageList {
    pub images: Vec<ImageView>,
}

/// Upload an image; the request body is the raw image bytes
async fn upload_image(
    State(ctx): State<AppContext>,
    caller: Caller,
    Path(item_id): Path<ItemId>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> MediaResult<(StatusCode, Json<ImageRecord>)> {
    let upload = ImageUpload {
        data: body.to_vec(),
        is_primary: params.is_primary,
        display_order: params.display_order,
    };

    let record = ctx.item_images.upload(caller.user_id, item_id, upload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_images(
    State(ctx): State<AppContext>,
    caller: Caller,
    Path(item_id): Path<ItemId>,
) -> MediaResult<Json<ImageList>> {
    let images = ctx.item_images.list(caller.user_id, item_id).await?;
    Ok(Json(ImageList { images }))
}

async fn delete_image(
    State(ctx): State<AppContext>,
    caller: Caller,
    Path((item_id, image_id)): Path<(ItemId, ImageId)>,
) -> MediaResult<StatusCode> {
    ctx.item_images.delete(caller.user_id, item_id, image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_primary(
    State(ctx): State<AppContext>,
    caller: Caller,
    Path((item_id, image_id)): Path<(ItemId, ImageId)>,
) -> MediaResult<Json<ImageRecord>> {
    let record = ctx
        .item_images
        .set_primary(caller.user_id, item_id, image_id)
        .await?;
    Ok(Json(record))
}
