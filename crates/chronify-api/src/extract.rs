use axum::{
    Json,
    extract::{Path, Query},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
};
use tracing::warn;

use crate::error::ApiError;

// Handlers take `Result<Extractor, Rejection>` so malformed input still
// produces the JSON error envelope instead of axum's plain-text rejection.

pub fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|e| {
        warn!("Failed to decode request body: {}", e);
        ApiError::Validation("Invalid request payload".into())
    })
}

pub fn path_param<T>(path: Result<Path<T>, PathRejection>, message: &str) -> Result<T, ApiError> {
    path.map(|Path(value)| value).map_err(|e| {
        warn!("{}: {}", message, e);
        ApiError::Validation(message.to_string())
    })
}

pub fn query_param<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query.map(|Query(value)| value).map_err(|e| {
        warn!("Failed to decode query string: {}", e);
        ApiError::Validation("Invalid query parameters".into())
    })
}
