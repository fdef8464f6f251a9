//! API error types.

use crate::chain::ChainError;
use crate::lifecycle::LifecycleError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// The remote claim service rejected or could not serve the request.
    #[error("remote claim service: {0}")]
    RemoteUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] corral_metadata::MetadataError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::RemoteUnavailable(_) => "remote_unavailable",
            Self::Internal(_) => "internal_error",
            Self::Metadata(_) => "metadata_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Metadata(e) => match e {
                corral_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                corral_metadata::MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                corral_metadata::MetadataError::Constraint(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::AlreadyReserved => Self::Conflict(err.to_string()),
            LifecycleError::AccountNotFound(_)
            | LifecycleError::CommitNotFound(_)
            | LifecycleError::ReservationNotFound(_) => Self::NotFound(err.to_string()),
            LifecycleError::AccountNotOwned(_) => Self::Forbidden(err.to_string()),
            LifecycleError::AccountInactive(_)
            | LifecycleError::RepoNotLinked(_)
            | LifecycleError::SelfGift => Self::BadRequest(err.to_string()),
            LifecycleError::Remote(message) => Self::RemoteUnavailable(message),
            LifecycleError::Store(e) => Self::Metadata(e),
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::InvalidSeed(message) => Self::BadRequest(message),
            ChainError::Store(e) => Self::Metadata(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
