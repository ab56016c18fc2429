use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use chronify_db::{UniqueViolation, unique_violation};
use chronify_types::api::{Claims, TimelineRequest, TimelineSearchQuery};

use crate::convert::{timeline_from_row, timelines_from_rows};
use crate::error::ApiError;
use crate::extract::{path_param, payload, query_param};
use crate::{AppState, run_blocking};

const TITLE_TAKEN: &str = "Timeline with this title already exists";

/// Non-blank title, trimmed; blank descriptions are stored as absent.
fn validated(req: TimelineRequest) -> Result<(String, Option<String>), ApiError> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }
    let description = req
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    Ok((title, description))
}

fn write_error(message: &'static str) -> impl FnOnce(anyhow::Error) -> ApiError {
    move |e| match unique_violation(&e) {
        Some(UniqueViolation::TimelineTitle) => ApiError::Conflict(TITLE_TAKEN),
        _ => ApiError::internal(message, e),
    }
}

pub async fn create_timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<TimelineRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (title, description) = validated(payload(body)?)?;
    let timeline_id = Uuid::new_v4();
    let user_id = claims.sub;

    let row = run_blocking(&state, move |db| {
        db.create_timeline(
            &timeline_id.to_string(),
            &user_id.to_string(),
            &title,
            description.as_deref(),
        )
        .map_err(write_error("Failed to create timeline"))
    })
    .await?;

    info!("User {} created timeline {}", claims.username, timeline_id);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": timeline_from_row(row),
            "message": "Timeline created successfully",
        })),
    ))
}

pub async fn list_timelines(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub.to_string();
    let rows = run_blocking(&state, move |db| {
        db.list_timelines(&user_id)
            .map_err(|e| ApiError::internal("Failed to retrieve timelines", e))
    })
    .await?;

    Ok(Json(json!({ "data": timelines_from_rows(rows) })))
}

pub async fn search_timelines(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    query: Result<Query<TimelineSearchQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let query = query_param(query)?;
    let user_id = claims.sub.to_string();
    let title = query.title.unwrap_or_default().trim().to_string();

    let rows = run_blocking(&state, move |db| {
        db.search_timelines(&user_id, &title)
            .map_err(|e| ApiError::internal("Failed to search timelines", e))
    })
    .await?;

    Ok(Json(json!({ "data": timelines_from_rows(rows) })))
}

pub async fn get_timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline_id = path_param(path, "Invalid timeline ID")?;
    let user_id = claims.sub;

    let row = run_blocking(&state, move |db| {
        db.get_timeline(&timeline_id.to_string(), &user_id.to_string())
            .map_err(|e| ApiError::internal("Failed to retrieve timeline", e))?
            .ok_or(ApiError::NotFound("Timeline not found"))
    })
    .await?;

    Ok(Json(json!({ "data": timeline_from_row(row) })))
}

pub async fn update_timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<TimelineRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline_id = path_param(path, "Invalid timeline ID")?;
    let (title, description) = validated(payload(body)?)?;
    let user_id = claims.sub;

    let row = run_blocking(&state, move |db| {
        db.update_timeline(
            &timeline_id.to_string(),
            &user_id.to_string(),
            &title,
            description.as_deref(),
        )
        .map_err(write_error("Failed to update timeline"))?
        .ok_or(ApiError::NotFound("Timeline not found"))
    })
    .await?;

    Ok(Json(json!({ "data": timeline_from_row(row) })))
}

pub async fn delete_timeline(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline_id = path_param(path, "Invalid timeline ID")?;
    let user_id = claims.sub;

    let deleted = run_blocking(&state, move |db| {
        db.delete_timeline(&timeline_id.to_string(), &user_id.to_string())
            .map_err(|e| ApiError::internal("Failed to delete timeline", e))
    })
    .await?;

    if !deleted {
        return Err(ApiError::NotFound("Timeline not found"));
    }

    info!("User {} deleted timeline {}", claims.username, timeline_id);
    Ok(Json(json!({ "message": "Timeline deleted successfully" })))
}
