//! Route definitions for the Field Health Monitoring Platform

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Field lifecycle
        .nest("/fields", field_routes())
        .route(
            "/recommendations/:recommendation_id/implemented",
            post(handlers::mark_implemented),
        )
        // Boundary capture
        .nest("/capture", capture_routes())
}

/// Field management routes
fn field_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_fields).post(handlers::create_field))
        .route("/:field_id", get(handlers::get_field))
        .route("/:field_id/boundary", put(handlers::remap_field))
        .route("/:field_id/boundaries", get(handlers::list_boundary_revisions))
        .route(
            "/:field_id/analyses",
            get(handlers::list_analyses).post(handlers::request_analysis),
        )
        .route("/:field_id/recommendations", get(handlers::list_recommendations))
}

/// Capture session routes
fn capture_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(handlers::open_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::cancel_session),
        )
        .route("/sessions/:session_id/points", post(handlers::add_point))
        .route("/sessions/:session_id/points/last", delete(handlers::undo_last_point))
        .route("/sessions/:session_id/points/:index", put(handlers::move_point))
        .route("/sessions/:session_id/samples", post(handlers::ingest_sample))
        .route("/sessions/:session_id/fallback", post(handlers::fall_back_to_manual))
        .route("/sessions/:session_id/finalize", post(handlers::finalize_session))
}
