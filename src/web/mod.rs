use axum::{Json, Router, extract::State, http::Method, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::server::config::ServerConfig;
use crate::services::{BookmarkService, TagSyntax};
use crate::version::VERSION;
use crate::web::routes::*;

pub mod error;
pub mod models;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub bookmarks: Arc<BookmarkService>,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InfoResponse {
    version: &'static str,
    store_name: String,
    key_namespace: String,
    tag_syntax: TagSyntax,
}

async fn info_handler(State(app_state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let config = &app_state.config;
    Json(InfoResponse {
        version: VERSION,
        store_name: config.store_name.clone(),
        key_namespace: config.key_namespace.clone(),
        tag_syntax: config.tag_syntax(),
    })
}

pub fn create_axum_router(bookmarks: Arc<BookmarkService>, config: Arc<ServerConfig>) -> Router {
    let app_state = Arc::new(AppState { bookmarks, config });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/info", get(info_handler))
        .nest("/api/urls", url_routes::create_urls_router())
        .nest("/api/tags", tag_routes::create_tags_router())
        .with_state(app_state)
        .layer(cors)
}
