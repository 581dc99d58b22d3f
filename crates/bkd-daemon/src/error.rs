//! Error taxonomy → HTTP status mapping.
//!
//! Validation and not-found conditions are recovered at the operation
//! boundary and translated to structured caller-visible errors. Persistence
//! failures are logged with context and surfaced generically — internals
//! never leak to the wire.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use bkd_db::StoreError;
use bkd_pricing::ReconcileError;
use bkd_query::FilterError;
use bkd_schemas::InvalidField;
use tracing::error;

use crate::api_types::ErrorBody;

#[derive(Debug)]
pub enum ApiError {
    /// Malformed or out-of-range input; nothing was mutated.
    Validation(String),
    /// The targeted record does not exist.
    NotFound(String),
    /// Optimistic concurrency rejection.
    Conflict(String),
    /// Server-side failure; the caller must not assume partial success.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                // Full detail to the log, generic message to the wire.
                error!(detail = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::VersionConflict { .. } => ApiError::Conflict(e.to_string()),
            StoreError::Corrupt { .. } | StoreError::Database(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(e: FilterError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<InvalidField> for ApiError {
    fn from(e: InvalidField) -> Self {
        ApiError::Validation(e.to_string())
    }
}
