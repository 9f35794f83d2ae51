/// Group logo endpoints
use crate::{
    auth::Caller,
    context::AppContext,
    error::{CompensationFailure, MediaResult},
    media::{LogoView, ReplacedLogo},
    permissions::GroupId,
};
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

/// Build group logo routes
pub fn routes() -> Router<AppContext> {
    Router::new().route(
        "/groups/:group_id/logo",
        get(get_logo).put(replace_logo).delete(remove_logo),
    )
}

#[derive(Debug, Serialize)]
pub struct LogoResponse {
    pub logo: Option<LogoView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedLogo {
    pub reclaim_failures: Vec<CompensationFailure>,
}

/// Replace the logo; the request body is the raw image bytes
async fn replace_logo(
    State(ctx): State<AppContext>,
    caller: Caller,
    Path(group_id): Path<GroupId>,
    body: Bytes,
) -> MediaResult<Json<ReplacedLogo>> {
    let replaced = ctx
        .group_logos
        .replace(caller.user_id, group_id, body.to_vec())
        .await?;
    Ok(Json(replaced))
}

async fn get_logo(
    State(ctx): State<AppContext>,
    caller: Caller,
    Path(group_id): Path<GroupId>,
) -> MediaResult<Json<LogoResponse>> {
    let logo = ctx.group_logos.get(caller.user_id, group_id).await?;
    Ok(Json(LogoResponse { logo }))
}

async fn remove_logo(
    State(ctx): State<AppContext>,
    caller: Caller,
    Path(group_id): Path<GroupId>,
) -> MediaResult<Json<RemovedLogo>> {
    let reclaim_failures = ctx.group_logos.remove(caller.user_id, group_id).await?;
    Ok(Json(RemovedLogo { reclaim_failures }))
}
