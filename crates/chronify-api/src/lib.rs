pub mod auth;
pub mod config;
pub mod convert;
pub mod drafter;
pub mod error;
pub mod events;
pub mod extract;
pub mod middleware;
pub mod reconcile;
pub mod timelines;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    http::StatusCode,
    middleware::{from_fn_with_state, map_response},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use tower_http::timeout::TimeoutLayer;
use serde_json::{Value, json};

use chronify_db::Database;

use crate::config::AuthConfig;
use crate::drafter::EventDrafter;
use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub auth: AuthConfig,
    /// `None` when AI drafting is not configured.
    pub drafter: Option<Arc<dyn EventDrafter>>,
}

/// All routes, with bearer auth on everything except register, login and health.
/// Transport layers (CORS, tracing, timeouts) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route(
            "/timelines",
            get(timelines::list_timelines).post(timelines::create_timeline),
        )
        .route("/timelines/search", get(timelines::search_timelines))
        .route(
            "/timelines/{timeline_id}",
            get(timelines::get_timeline)
                .put(timelines::update_timeline)
                .delete(timelines::delete_timeline),
        )
        .route(
            "/timelines/{timeline_id}/events",
            get(events::list_events).post(events::upsert_events),
        )
        .route("/timelines/{timeline_id}/aievents", post(events::draft_events))
        .route(
            "/timelines/{timeline_id}/events/{event_id}",
            delete(events::delete_event),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Bound every request to `timeout`; a request that runs out of time is
/// answered with a 408 error envelope.
pub fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(map_response(timeout_envelope))
}

async fn timeout_envelope(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        ApiError::Timeout.into_response()
    } else {
        response
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::internal("Internal server error", e))?
}
