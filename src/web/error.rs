use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::db::error::RepositoryError;
use crate::services::bookmark_service::BookmarkError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Store error: {0}")]
    StoreError(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::StoreError(msg) => {
                error!(error = %msg, "Key-value store request failed.");
                (StatusCode::BAD_GATEWAY, format!("Store error: {msg}"))
            }
            AppError::InternalServerError(msg) => {
                error!(error = %msg, "Internal server error.");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(key) => AppError::NotFound(format!("No record at {key}")),
            RepositoryError::InvalidRecord(msg) => AppError::InvalidInput(msg),
            RepositoryError::StoreRejected(_) | RepositoryError::Transport(_) => {
                AppError::StoreError(err.to_string())
            }
            RepositoryError::Decode { .. } | RepositoryError::Encode(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<BookmarkError> for AppError {
    fn from(err: BookmarkError) -> Self {
        match err {
            BookmarkError::UrlNotFound(_) | BookmarkError::TagNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            BookmarkError::UrlAlreadyExists(_) => AppError::Conflict(err.to_string()),
            BookmarkError::InvalidUrl(_) => AppError::InvalidInput(err.to_string()),
            BookmarkError::Repository(inner) => inner.into(),
        }
    }
}
