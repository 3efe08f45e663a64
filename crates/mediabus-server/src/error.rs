//! The HTTP-facing error kind table. Runtime and the filesystem layer return
//! typed outcomes; handlers translate them here exactly once, per the
//! propagation policy: catch everything, map to a kind, never leak a stack.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info};

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotAuthorized,
    Revoked(String),
    PolicyDenied(String),
    NotFound,
    Conflict,
    ResourceUnavailable(String),
    ClientAborted,
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "status": "error", "error": msg }))).into_response()
            }
            ApiError::NotAuthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "status": "error", "error": "not authenticated" })),
            )
                .into_response(),
            ApiError::Revoked(msg) => {
                info!(reason = %msg, "request rejected: device revoked");
                (StatusCode::UNAUTHORIZED, Json(json!({ "status": "revoked", "error": msg }))).into_response()
            }
            ApiError::PolicyDenied(msg) => {
                (StatusCode::FORBIDDEN, Json(json!({ "status": "error", "error": msg }))).into_response()
            }
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": "error", "error": "not found" })),
            )
                .into_response(),
            ApiError::Conflict => (
                StatusCode::CONFLICT,
                Json(json!({ "status": "error", "error": "already exists" })),
            )
                .into_response(),
            ApiError::ResourceUnavailable(msg) => {
                error!(error = %msg, "shared resource unavailable");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "status": "error", "error": msg }))).into_response()
            }
            ApiError::ClientAborted => {
                info!("client aborted transfer");
                StatusCode::NO_CONTENT.into_response()
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "status": "error", "error": msg }))).into_response()
            }
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => ApiError::NotFound,
            std::io::ErrorKind::AlreadyExists => ApiError::Conflict,
            std::io::ErrorKind::PermissionDenied => ApiError::ResourceUnavailable(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}
