//! Error handling for the Field Health Monitoring Platform
//!
//! Provides consistent error responses in English and Hindi

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{AnalysisRecord, GeometryError, InvalidTransition};
use thiserror::Error;

use crate::external::ProviderError as IndexProviderError;
use crate::storage::StorageError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Geometry errors
    #[error("Incomplete boundary: {found} of {required} points")]
    IncompleteBoundary { found: usize, required: usize },

    #[error("Degenerate boundary geometry")]
    DegenerateGeometry,

    #[error("Geometry error: {0}")]
    Geometry(GeometryError),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_hi: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // External service errors
    #[error("Position source unavailable: {0}")]
    PositionSourceUnavailable(String),

    #[error("Vegetation index provider error: {0}")]
    ProviderError(String),

    /// The provider failed and the analysis was stored as failed
    #[error("Analysis failed: {}", .record.failure_reason.as_deref().unwrap_or("unknown"))]
    AnalysisFailed { record: Box<AnalysisRecord> },

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Validation error for a named input field
    pub fn validation(field: &str, message: &str, message_hi: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_hi: message_hi.to_string(),
        }
    }
}

impl From<GeometryError> for AppError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::IncompleteBoundary { found, required } => {
                AppError::IncompleteBoundary { found, required }
            }
            GeometryError::DegenerateGeometry => AppError::DegenerateGeometry,
            other => AppError::Geometry(other),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => AppError::NotFound(format!("{} {}", entity, id)),
            other => AppError::PersistenceError(other.to_string()),
        }
    }
}

impl From<IndexProviderError> for AppError {
    fn from(err: IndexProviderError) -> Self {
        AppError::ProviderError(err.to_string())
    }
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisRecord>,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_hi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

fn detail(code: &str, message_en: String, message_hi: &str) -> ErrorDetail {
    ErrorDetail {
        code: code.to_string(),
        message_en,
        message_hi: message_hi.to_string(),
        field: None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::IncompleteBoundary { found, required } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail(
                    "INCOMPLETE_BOUNDARY",
                    format!(
                        "A boundary needs at least {} distinct points, {} given",
                        required, found
                    ),
                    "सीमा के लिए कम से कम तीन अलग बिंदु चाहिए",
                ),
            ),
            AppError::DegenerateGeometry => (
                StatusCode::UNPROCESSABLE_ENTITY,
                detail(
                    "DEGENERATE_GEOMETRY",
                    "The boundary points lie on a line and enclose no area".to_string(),
                    "सीमा के बिंदु एक रेखा पर हैं और कोई क्षेत्रफल नहीं बनाते",
                ),
            ),
            AppError::Geometry(err) => {
                let (status, code, message_hi) = match err {
                    GeometryError::InvalidCoordinate { .. } => (
                        StatusCode::BAD_REQUEST,
                        "INVALID_COORDINATE",
                        "निर्देशांक मान्य सीमा से बाहर है",
                    ),
                    GeometryError::PointIndexOutOfRange { .. } => (
                        StatusCode::NOT_FOUND,
                        "POINT_NOT_FOUND",
                        "यह बिंदु मौजूद नहीं है",
                    ),
                    GeometryError::CaptureModeMismatch { .. } => (
                        StatusCode::CONFLICT,
                        "CAPTURE_MODE_MISMATCH",
                        "यह क्रिया वर्तमान मापन मोड में उपलब्ध नहीं है",
                    ),
                    GeometryError::InvalidCaptureSettings(_) => (
                        StatusCode::BAD_REQUEST,
                        "INVALID_CAPTURE_SETTINGS",
                        "मापन सेटिंग्स अमान्य हैं",
                    ),
                    GeometryError::InvalidGeoJson(_) => (
                        StatusCode::BAD_REQUEST,
                        "INVALID_GEOJSON",
                        "सीमा का GeoJSON अमान्य है",
                    ),
                    GeometryError::IncompleteBoundary { .. } | GeometryError::DegenerateGeometry => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "INVALID_BOUNDARY",
                        "सीमा अमान्य है",
                    ),
                };
                (status, detail(code, err.to_string(), message_hi))
            }
            AppError::Validation {
                field,
                message,
                message_hi,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_hi: message_hi.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                detail(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    "अनुरोधित संसाधन नहीं मिला",
                ),
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::CONFLICT,
                detail(
                    "INVALID_STATE_TRANSITION",
                    msg.clone(),
                    "खेत की वर्तमान स्थिति में यह क्रिया संभव नहीं है",
                ),
            ),
            AppError::PositionSourceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                detail(
                    "POSITION_SOURCE_UNAVAILABLE",
                    format!("Location is unavailable: {}. Continue by placing points manually", msg),
                    "स्थान उपलब्ध नहीं है, कृपया बिंदु हाथ से लगाएँ",
                ),
            ),
            AppError::ProviderError(msg) => (
                StatusCode::BAD_GATEWAY,
                detail(
                    "PROVIDER_ERROR",
                    format!("Satellite index service error: {}", msg),
                    "उपग्रह सूचकांक सेवा में त्रुटि",
                ),
            ),
            AppError::AnalysisFailed { record } => (
                StatusCode::BAD_GATEWAY,
                detail(
                    "ANALYSIS_FAILED",
                    format!(
                        "Analysis failed: {}",
                        record.failure_reason.as_deref().unwrap_or("unknown")
                    ),
                    "विश्लेषण विफल रहा, कृपया बाद में पुनः प्रयास करें",
                ),
            ),
            AppError::PersistenceError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(
                    "PERSISTENCE_ERROR",
                    "Could not save data, please retry".to_string(),
                    "डेटा सहेजा नहीं जा सका, कृपया पुनः प्रयास करें",
                ),
            ),
            AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(
                    "CONFIGURATION_ERROR",
                    "Server configuration error".to_string(),
                    "सर्वर कॉन्फ़िगरेशन त्रुटि",
                ),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    "सर्वर में आंतरिक त्रुटि हुई",
                ),
            ),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let analysis = match self {
            AppError::AnalysisFailed { record } => Some(*record),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                error: error_detail,
                analysis,
            }),
        )
            .into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
