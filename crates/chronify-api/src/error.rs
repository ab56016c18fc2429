use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use chronify_types::models::Event;

use crate::convert::events_from_rows;
use crate::drafter::DraftError;
use crate::reconcile::{FailureReason, ItemFailure, ReconcileError};

/// Every handler failure. Rendered as `{"error": "..."}` with a status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    /// Logged with its cause; the client only sees `message`.
    #[error("{message}")]
    Internal {
        message: &'static str,
        cause: anyhow::Error,
    },

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Unavailable(&'static str),

    #[error("Request timed out")]
    Timeout,

    /// A rolled-back update set, with the items that caused it.
    #[error("Failed to update one or more events")]
    UpdateRejected {
        failures: Vec<ItemFailure>,
        events: Option<Vec<Event>>,
    },
}

impl ApiError {
    pub fn internal(message: &'static str, cause: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            message,
            cause: cause.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::UpdateRejected { failures, .. } => {
                if failures.iter().all(|f| f.reason == FailureReason::NotFound) {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Internal { message, cause } => {
                error!("{}: {:#}", message, cause);
                json!({ "error": message })
            }
            Self::UpdateRejected { failures, events } => json!({
                "error": "Failed to update one or more events",
                "failed": failures,
                "events": events,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::EmptyBatch | ReconcileError::MissingField { .. } => {
                Self::Validation(err.to_string())
            }
            ReconcileError::UpdateRejected { failures, events } => Self::UpdateRejected {
                failures,
                events: events.map(events_from_rows),
            },
            ReconcileError::Storage { message, cause } => Self::Internal { message, cause },
        }
    }
}

impl From<DraftError> for ApiError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::NotConfigured => Self::Unavailable("AI event generation is not configured"),
            other => {
                error!("Event drafting failed: {}", other);
                Self::Upstream("Failed to generate events".into())
            }
        }
    }
}
