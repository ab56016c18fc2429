use axum::{
    Extension, Json,
    extract::{Path, State},
    extract::rejection::{JsonRejection, PathRejection},
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use chronify_db::Database;
use chronify_types::api::{AiEventRequest, Claims, UpsertEventRequest};

use crate::convert::events_from_rows;
use crate::drafter::DraftError;
use crate::error::ApiError;
use crate::extract::{path_param, payload};
use crate::reconcile;
use crate::{AppState, run_blocking};

/// Events are reachable only through a timeline the caller owns.
fn ensure_owned(db: &Database, timeline_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
    db.get_timeline(&timeline_id.to_string(), &user_id.to_string())
        .map_err(|e| ApiError::internal("Failed to retrieve timeline", e))?
        .map(|_| ())
        .ok_or(ApiError::NotFound("Timeline not found"))
}

pub async fn list_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline_id = path_param(path, "Invalid timeline ID")?;
    let user_id = claims.sub;

    let rows = run_blocking(&state, move |db| {
        ensure_owned(db, timeline_id, user_id)?;
        db.list_events(&timeline_id.to_string())
            .map_err(|e| ApiError::internal("Failed to retrieve events", e))
    })
    .await?;

    Ok(Json(json!({ "events": events_from_rows(rows) })))
}

/// POST /timelines/{id}/events: create and update a mixed batch, answer
/// with the timeline's full event list.
pub async fn upsert_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Vec<UpsertEventRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline_id = path_param(path, "Invalid timeline ID")?;
    let batch = payload(body)?;
    reconcile::validate(&batch)?;
    let user_id = claims.sub;

    let outcome = run_blocking(&state, move |db| {
        ensure_owned(db, timeline_id, user_id)?;
        Ok(reconcile::reconcile(db, timeline_id, batch)?)
    })
    .await?;

    Ok(Json(json!({
        "events": events_from_rows(outcome.events),
        "created": outcome.created,
        "updated": outcome.updated,
    })))
}

/// POST /timelines/{id}/aievents: draft events from a prompt and insert them.
pub async fn draft_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<AiEventRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let timeline_id = path_param(path, "Invalid timeline ID")?;
    let prompt = payload(body)?.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(ApiError::Validation("Prompt is required".into()));
    }
    let user_id = claims.sub;

    run_blocking(&state, move |db| ensure_owned(db, timeline_id, user_id)).await?;

    let drafter = state
        .drafter
        .clone()
        .ok_or(DraftError::NotConfigured)?;

    info!("Drafting events for timeline {} with {}", timeline_id, drafter.name());
    let drafts = drafter.draft(&prompt).await?;
    let batch: Vec<UpsertEventRequest> = drafts.into_iter().map(Into::into).collect();

    let outcome = run_blocking(&state, move |db| {
        Ok(reconcile::create_all(db, timeline_id, batch)?)
    })
    .await?;

    Ok(Json(json!({
        "events": events_from_rows(outcome.events),
        "created": outcome.created,
    })))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let (timeline_id, event_id) = path_param(path, "Invalid timeline or event ID")?;
    let user_id = claims.sub;

    let rows = run_blocking(&state, move |db| {
        ensure_owned(db, timeline_id, user_id)?;
        let deleted = db
            .delete_event(&event_id.to_string(), &timeline_id.to_string())
            .map_err(|e| ApiError::internal("Failed to delete event", e))?;
        if !deleted {
            return Err(ApiError::NotFound("Event not found"));
        }
        db.list_events(&timeline_id.to_string())
            .map_err(|e| ApiError::internal("Failed to retrieve events", e))
    })
    .await?;

    Ok(Json(json!({
        "message": "Event deleted successfully",
        "events": events_from_rows(rows),
    })))
}
