//! HTTP error mapping for the host

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use shellcache_core::CoreError;
use shellcache_proxy::NetworkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            HostError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            HostError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            HostError::Network(e) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.to_string()),
            HostError::Core(e) => match e {
                CoreError::Network(inner) => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", inner.to_string())
                }
                CoreError::InvalidState(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Storage(inner) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    inner.to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    e.to_string(),
                ),
            },
        };

        let body = axum::Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
