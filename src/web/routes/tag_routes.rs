use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use std::sync::Arc;

use crate::web::models::{TagDetailResponse, TagListResponse};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_tags_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<TagListResponse>, AppError> {
    let listing = app_state.bookmarks.list_tags().await?;
    Ok(Json(listing.into()))
}

async fn get_tag_handler(
    State(app_state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TagDetailResponse>, AppError> {
    let detail = app_state.bookmarks.urls_for_tag(&name).await?;
    Ok(Json(detail.into()))
}

// --- Router ---

pub fn create_tags_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tags_handler))
        .route("/{name}", get(get_tag_handler))
}
