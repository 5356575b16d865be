use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use merkle_commit::MerkleError;
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error")]
    Internal,
}

/// Log an unexpected failure and collapse it into [`ApiError::Internal`].
pub fn internal<E: Display>(e: E) -> ApiError {
    tracing::error!(error = %e, "internal error");
    ApiError::Internal
}

impl From<MerkleError> for ApiError {
    fn from(e: MerkleError) -> Self {
        match e {
            MerkleError::EmptyInput => ApiError::BadRequest("batch must contain at least one record".to_string()),
            MerkleError::IndexOutOfRange { .. } => ApiError::BadRequest(e.to_string()),
            MerkleError::LeafNotFound(_) => ApiError::NotFound(e.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        };

        (status, Json(ErrorBody { error: msg })).into_response()
    }
}
