//! Error types for geometry and domain state

use thiserror::Error;
use uuid::Uuid;

use crate::models::FieldState;

/// Errors raised while building or validating a field boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("boundary needs at least {required} distinct points, found {found}")]
    IncompleteBoundary { found: usize, required: usize },

    #[error("boundary points are collinear and enclose no area")]
    DegenerateGeometry,

    #[error("invalid coordinate (latitude {latitude}, longitude {longitude}): {reason}")]
    InvalidCoordinate {
        latitude: f64,
        longitude: f64,
        reason: &'static str,
    },

    #[error("point index {index} is out of range for {len} points")]
    PointIndexOutOfRange { index: usize, len: usize },

    #[error("operation requires a {expected} capture session")]
    CaptureModeMismatch { expected: &'static str },

    #[error("invalid capture settings: {0}")]
    InvalidCaptureSettings(&'static str),

    #[error("invalid GeoJSON polygon: {0}")]
    InvalidGeoJson(String),
}

/// A lifecycle transition that the field state machine does not allow
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} a field that is {from}")]
pub struct InvalidTransition {
    pub from: FieldState,
    pub action: &'static str,
}

/// An analysis record that was already completed or failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("analysis {0} has already been resolved")]
pub struct AlreadyResolved(pub Uuid);
