use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cadence_shared::AuthError;
use cadence_sync::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Auth protocol failure; the client sees the collapsed generic
    /// message, never the internal distinction.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Missing or invalid bearer session on a protected endpoint.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Out-of-band code dispatch failed.
    #[error("Code dispatch failed: {0}")]
    Dispatch(String),

    /// The remote snapshot store misbehaved.
    #[error("Snapshot store error: {0}")]
    Snapshot(#[from] RemoteError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Auth(err) => {
                let status = match err {
                    AuthError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::BAD_REQUEST,
                };
                // Full detail goes to the log only.
                tracing::debug!(error = %err, "auth check failed");
                (status, err.user_message().to_string())
            }
            ApiError::Unauthorized(detail) => {
                tracing::debug!(detail = %detail, "rejected bearer session");
                (StatusCode::UNAUTHORIZED, "Not authenticated".to_string())
            }
            ApiError::Dispatch(detail) => {
                tracing::error!(detail = %detail, "code dispatch failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to send code".to_string())
            }
            ApiError::Snapshot(err) => {
                tracing::error!(error = %err, "snapshot store failure");
                (StatusCode::BAD_GATEWAY, "Shared data store unavailable".to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
