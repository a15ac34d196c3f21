//! Boundary capture HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::PositionSample;
use uuid::Uuid;

use crate::services::capture::{FallbackInput, OpenSessionInput, PointInput};
use crate::AppState;

/// Open a capture session
pub async fn open_session(
    State(state): State<AppState>,
    Json(input): Json<OpenSessionInput>,
) -> impl IntoResponse {
    match state.capture.open(input).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Current points, area and events of a session
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.capture.snapshot(session_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Place a point (manual mode)
pub async fn add_point(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<PointInput>,
) -> impl IntoResponse {
    match state.capture.add_point(session_id, input).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Drag-adjust a point
pub async fn move_point(
    State(state): State<AppState>,
    Path((session_id, index)): Path<(Uuid, usize)>,
    Json(input): Json<PointInput>,
) -> impl IntoResponse {
    match state.capture.move_point(session_id, index, input).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Remove the last placed point
pub async fn undo_last_point(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.capture.undo_last_point(session_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Ingest a GPS sample (continuous mode)
pub async fn ingest_sample(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(sample): Json<PositionSample>,
) -> impl IntoResponse {
    match state.capture.ingest_sample(session_id, sample).await {
        Ok((outcome, view)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "result": outcome, "session": view })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Continue a walking capture by hand
pub async fn fall_back_to_manual(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    input: Option<Json<FallbackInput>>,
) -> impl IntoResponse {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    match state.capture.fall_back_to_manual(session_id, input).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Finalize the boundary and create the field
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.capture.finalize(session_id, &state.fields).await {
        Ok(field) => (StatusCode::CREATED, Json(field)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Abandon a session
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.capture.cancel(session_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
