//! Maps crate-boundary errors onto HTTP responses.
//!
//! Grounded on `ferrex-server::errors::AppError` — a status-plus-message
//! struct that every handler's `Result` collapses into, rather than a
//! `thiserror` enum per failure mode (there's no caller inside this crate
//! that needs to match on the variant, only render it).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": { "message": self.message, "status": self.status.as_u16() }
        }));
        (self.status, body).into_response()
    }
}

impl From<sluice_catalog::CatalogError> for AppError {
    fn from(err: sluice_catalog::CatalogError) -> Self {
        match err {
            sluice_catalog::CatalogError::NotFound(msg) => Self::not_found(msg),
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl From<sluice_queue::QueueError> for AppError {
    fn from(err: sluice_queue::QueueError) -> Self {
        match err {
            sluice_queue::QueueError::NotFound(id) => Self::not_found(format!("job {id} not found")),
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl From<sluice_coordinator::CoordinatorError> for AppError {
    fn from(err: sluice_coordinator::CoordinatorError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}
