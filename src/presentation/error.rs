// Request error taxonomy and its HTTP mapping
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::application::ingestion::IngestError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API key")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("Unsupported Media Type")]
    UnsupportedMediaType,
    #[error("Not found")]
    NotFound,
    #[error("No data")]
    NoData,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotFound | ApiError::NoData => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // internals are logged, not leaked
            ApiError::Internal(e) => {
                tracing::error!("request failed: {:#}", e);
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Store(e) => ApiError::Internal(e),
            validation => ApiError::Validation(validation.to_string()),
        }
    }
}
