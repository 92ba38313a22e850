use axum::{
    Json, Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, put},
};
use std::sync::Arc;

use crate::web::models::{
    CreateUrlRequest, RetagRequest, RetagResponse, UrlListResponse, UrlResponse,
};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_urls_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<UrlListResponse>, AppError> {
    let listing = app_state.bookmarks.list_urls().await?;
    Ok(Json(listing.into()))
}

async fn create_url_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateUrlRequest>,
) -> Result<impl IntoResponse, AppError> {
    let record = app_state.bookmarks.add_url(&payload.url).await?;
    let location = record.uri();
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(UrlResponse::from(record)),
    ))
}

async fn get_url_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UrlResponse>, AppError> {
    let record = app_state.bookmarks.get_url(&id).await?;
    Ok(Json(record.into()))
}

async fn retag_url_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<RetagRequest>,
) -> Result<Json<RetagResponse>, AppError> {
    let report = app_state
        .bookmarks
        .retag_with_report(&id, &payload.tags)
        .await?;
    Ok(Json(report.into()))
}

async fn delete_url_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    app_state.bookmarks.delete_url(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_urls_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_urls_handler).post(create_url_handler))
        .route("/{id}", get(get_url_handler).delete(delete_url_handler))
        .route("/{id}/tags", put(retag_url_handler))
}
