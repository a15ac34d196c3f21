//! Boundary capture sessions
//!
//! A [`CaptureSession`] owns the points of one boundary being drawn, either
//! by explicit map placement or by walking the field with a GPS sensor. It
//! is independent of any map widget: the UI renders from [`CaptureSnapshot`].
//!
//! Every mutation updates the point list and the cached area inside the same
//! `&mut self` call, so a snapshot never pairs points with a stale area.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::geodesy::{haversine_distance, perimeter, polygon_area, square_meters_to_hectares};
use crate::models::{distinct_positions, FieldBoundary};
use crate::types::GeoPoint;
use crate::validation::validate_min_displacement;

/// A boundary needs at least this many distinct points
pub const MIN_BOUNDARY_POINTS: usize = 3;

/// Default jitter filter for continuous capture
pub const DEFAULT_MIN_DISPLACEMENT_METERS: f64 = 5.0;

/// How points enter a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CaptureMode {
    /// One point per explicit placement
    Manual,
    /// Position samples; a sample becomes a point only after moving far enough
    Continuous { min_displacement_meters: f64 },
}

impl CaptureMode {
    pub fn continuous_default() -> Self {
        CaptureMode::Continuous {
            min_displacement_meters: DEFAULT_MIN_DISPLACEMENT_METERS,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CaptureMode::Manual => "manual",
            CaptureMode::Continuous { .. } => "continuous",
        }
    }
}

/// Result of offering a position sample to a continuous session
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SampleOutcome {
    Accepted { index: usize },
    /// Too close to the last accepted point
    Suppressed { distance_meters: f64 },
}

/// Consistent view of a session
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CaptureSnapshot {
    pub mode: CaptureMode,
    pub points: Vec<GeoPoint>,
    pub area_square_meters: f64,
    pub area_hectares: f64,
    pub perimeter_meters: f64,
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// A boundary that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedBoundary {
    pub boundary: FieldBoundary,
    pub area_square_meters: f64,
    pub area_hectares: f64,
}

/// Owned state of one boundary capture
#[derive(Debug, Clone)]
pub struct CaptureSession {
    mode: CaptureMode,
    points: Vec<GeoPoint>,
    area_square_meters: f64,
    perimeter_meters: f64,
    fallback_reason: Option<String>,
}

impl CaptureSession {
    pub fn new(mode: CaptureMode) -> Result<Self, GeometryError> {
        if let CaptureMode::Continuous {
            min_displacement_meters,
        } = mode
        {
            validate_min_displacement(min_displacement_meters)
                .map_err(GeometryError::InvalidCaptureSettings)?;
        }
        Ok(Self::empty(mode))
    }

    pub fn manual() -> Self {
        Self::empty(CaptureMode::Manual)
    }

    fn empty(mode: CaptureMode) -> Self {
        Self {
            mode,
            points: Vec::new(),
            area_square_meters: 0.0,
            perimeter_meters: 0.0,
            fallback_reason: None,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn area_square_meters(&self) -> f64 {
        self.area_square_meters
    }

    pub fn area_hectares(&self) -> f64 {
        square_meters_to_hectares(self.area_square_meters)
    }

    /// Place a point (manual mode)
    pub fn add_point(&mut self, point: GeoPoint) -> Result<usize, GeometryError> {
        if self.mode != CaptureMode::Manual {
            return Err(GeometryError::CaptureModeMismatch { expected: "manual" });
        }
        self.points.push(point);
        self.recompute();
        Ok(self.points.len() - 1)
    }

    /// Offer a sensor sample (continuous mode)
    ///
    /// The first sample is always kept. Later samples are kept only when
    /// strictly farther than the displacement threshold from the last kept
    /// point; reported accuracy is stored but does not gate acceptance.
    pub fn ingest_sample(&mut self, point: GeoPoint) -> Result<SampleOutcome, GeometryError> {
        let CaptureMode::Continuous {
            min_displacement_meters,
        } = self.mode
        else {
            return Err(GeometryError::CaptureModeMismatch {
                expected: "continuous",
            });
        };

        if let Some(last) = self.points.last() {
            let distance_meters = haversine_distance(last, &point);
            if distance_meters <= min_displacement_meters {
                return Ok(SampleOutcome::Suppressed { distance_meters });
            }
        }

        self.points.push(point);
        self.recompute();
        Ok(SampleOutcome::Accepted {
            index: self.points.len() - 1,
        })
    }

    /// Drag-adjust an existing point to new coordinates
    pub fn move_point(
        &mut self,
        index: usize,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), GeometryError> {
        let len = self.points.len();
        let point = self
            .points
            .get_mut(index)
            .ok_or(GeometryError::PointIndexOutOfRange { index, len })?;
        point.reposition(latitude, longitude)?;
        self.recompute();
        Ok(())
    }

    /// Remove the most recent point
    pub fn undo_last_point(&mut self) -> Option<GeoPoint> {
        let removed = self.points.pop();
        if removed.is_some() {
            self.recompute();
        }
        removed
    }

    /// Drop every point, keeping the mode
    pub fn clear(&mut self) {
        self.points.clear();
        self.recompute();
    }

    /// Continue a continuous session by hand after the position source failed
    pub fn fall_back_to_manual(&mut self, reason: impl Into<String>) {
        self.mode = CaptureMode::Manual;
        self.fallback_reason = Some(reason.into());
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            mode: self.mode,
            points: self.points.clone(),
            area_square_meters: self.area_square_meters,
            area_hectares: self.area_hectares(),
            perimeter_meters: self.perimeter_meters,
            is_complete: self.area_square_meters > 0.0,
            fallback_reason: self.fallback_reason.clone(),
        }
    }

    /// Validate the captured ring
    ///
    /// Leaves the session untouched so a failed save can be retried.
    pub fn finalize(&self) -> Result<FinalizedBoundary, GeometryError> {
        let distinct = distinct_positions(&self.points);
        if distinct < MIN_BOUNDARY_POINTS {
            return Err(GeometryError::IncompleteBoundary {
                found: distinct,
                required: MIN_BOUNDARY_POINTS,
            });
        }
        let boundary = FieldBoundary::new(self.points.clone())?;
        Ok(FinalizedBoundary {
            area_square_meters: boundary.area_square_meters(),
            area_hectares: boundary.area_hectares(),
            boundary,
        })
    }

    fn recompute(&mut self) {
        self.area_square_meters = polygon_area(&self.points);
        self.perimeter_meters = perimeter(&self.points);
    }
}
