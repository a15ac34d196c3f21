//! Field lifecycle HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::services::field::{
    CreateFieldInput, MarkImplementedInput, RemapFieldInput, RequestAnalysisInput,
};
use crate::services::AnalysisOutcome;
use crate::AppState;

/// List all fields
pub async fn list_fields(State(state): State<AppState>) -> impl IntoResponse {
    match state.fields.list_fields().await {
        Ok(fields) => (StatusCode::OK, Json(serde_json::json!({ "fields": fields }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a field with its latest analysis
pub async fn get_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.fields.get_field_detail(field_id).await {
        Ok(field) => (StatusCode::OK, Json(field)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Create a field, with or without a boundary
pub async fn create_field(
    State(state): State<AppState>,
    Json(input): Json<CreateFieldInput>,
) -> impl IntoResponse {
    match state.fields.create_field(input).await {
        Ok(field) => (StatusCode::CREATED, Json(field)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Replace a field boundary
pub async fn remap_field(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Json(input): Json<RemapFieldInput>,
) -> impl IntoResponse {
    match state.fields.remap_field(field_id, input).await {
        Ok(field) => (StatusCode::OK, Json(field)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Boundaries replaced by earlier remaps
pub async fn list_boundary_revisions(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.fields.list_boundary_revisions(field_id).await {
        Ok(revisions) => {
            (StatusCode::OK, Json(serde_json::json!({ "revisions": revisions }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Request a vegetation index analysis
///
/// Runs on its own task so a dropped connection does not abandon a
/// pending record.
pub async fn request_analysis(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
    Json(input): Json<RequestAnalysisInput>,
) -> impl IntoResponse {
    let outcome = match state.fields.spawn_analysis(field_id, input).await {
        Ok(outcome) => outcome,
        Err(join_error) => {
            return AppError::Internal(join_error.to_string()).into_response()
        }
    };

    match outcome {
        Ok(AnalysisOutcome::Completed {
            analysis,
            recommendations,
            reused,
        }) => {
            let status = if reused {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (
                status,
                Json(serde_json::json!({
                    "analysis": analysis,
                    "recommendations": recommendations,
                    "reused": reused,
                })),
            )
                .into_response()
        }
        Ok(AnalysisOutcome::Failed { analysis }) => AppError::AnalysisFailed {
            record: Box::new(analysis),
        }
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Analysis time series of a field
pub async fn list_analyses(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.fields.list_analyses(field_id).await {
        Ok(analyses) => {
            (StatusCode::OK, Json(serde_json::json!({ "analyses": analyses }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Recommendations of a field
pub async fn list_recommendations(
    State(state): State<AppState>,
    Path(field_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.fields.list_recommendations(field_id).await {
        Ok(recommendations) => (
            StatusCode::OK,
            Json(serde_json::json!({ "recommendations": recommendations })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Mark a recommendation as implemented
pub async fn mark_implemented(
    State(state): State<AppState>,
    Path(recommendation_id): Path<Uuid>,
    input: Option<Json<MarkImplementedInput>>,
) -> impl IntoResponse {
    let input = input.map(|Json(input)| input).unwrap_or_default();
    match state.fields.mark_implemented(recommendation_id, input).await {
        Ok(recommendation) => (StatusCode::OK, Json(recommendation)).into_response(),
        Err(e) => e.into_response(),
    }
}
