/// HTTP API surface for the media service
pub mod groups;
pub mod items;
pub mod objects;

use crate::context::AppContext;
use axum::Router;

/// Build all API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(items::routes())
        .merge(groups::routes())
        .merge(objects::routes())
}
