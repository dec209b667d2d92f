use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::state::AppState;

/// Builds the axum router for every endpoint in `spec.md` §6, plus the
/// ambient `/healthz` liveness check. `TraceLayer`/`CorsLayer`/
/// `TimeoutLayer` mirror the `tower-http` pairing grounded in
/// `other_examples/manifests/{fourthplaces-mntogether,sideseat-sideseat}`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/submit", post(handlers::post_submit))
        .route("/api/upload", post(handlers::post_upload))
        .route("/api/submission/:id/status", get(handlers::get_submission_status))
        .route("/api/submission/:id", get(handlers::get_submission))
        .route("/api/submission/:id", delete(handlers::delete_submission))
        .route("/api/submission/:id/refresh", post(handlers::post_refresh))
        .route("/api/submissions", get(handlers::list_submissions))
        .route("/api/task-queue", get(handlers::list_task_queue))
        .route("/api/task-queue/:entry_id", delete(handlers::delete_task_queue_entry))
        .route("/api/task-queue/:entry_id/repeat", post(handlers::repeat_task_queue_entry))
        .route("/api/task-queue/add", post(handlers::add_task_queue_entry))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
