use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Failures of the storage provider. Both are recoverable: the caller
/// re-reads full collections instead of retrying the write in place.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("cache storage error: {0}")]
    Storage(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Network(#[from] CacheError),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    /// Tells the UI to re-fetch its snapshot rather than trust local state.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    reconcile: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, reconcile) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", false),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", false),
            AppError::Storage(StorageError::Unavailable(msg)) => {
                tracing::error!(error = %msg, "storage unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", true)
            }
            AppError::Storage(StorageError::TransactionFailed(msg)) => {
                tracing::error!(error = %msg, "storage transaction failed");
                (StatusCode::SERVICE_UNAVAILABLE, "transaction_failed", true)
            }
            AppError::Network(err) => {
                tracing::warn!(error = %err, "upstream fetch failed");
                (StatusCode::BAD_GATEWAY, "network_unavailable", false)
            }
        };

        let body = ErrorResponse {
            error,
            details: Some(self.to_string()),
            reconcile,
        };

        (status, Json(body)).into_response()
    }
}
