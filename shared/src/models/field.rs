//! Field and boundary models

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::MIN_BOUNDARY_POINTS;
use crate::error::{GeometryError, InvalidTransition};
use crate::geodesy::{perimeter, polygon_area, square_meters_to_hectares};
use crate::geojson::PolygonGeometry;
use crate::models::CropType;
use crate::types::GeoPoint;

/// A validated, implicitly closed field boundary
///
/// Holds at least three distinct points enclosing a non-zero area. The
/// wire form is a GeoJSON polygon; persistence keeps the full points so
/// capture accuracy and timestamps survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PolygonGeometry", try_from = "PolygonGeometry")]
pub struct FieldBoundary {
    points: Vec<GeoPoint>,
    area_square_meters: f64,
}

impl FieldBoundary {
    /// Validate a ring of points into a boundary
    pub fn new(points: Vec<GeoPoint>) -> Result<Self, GeometryError> {
        let distinct = distinct_positions(&points);
        if distinct < MIN_BOUNDARY_POINTS {
            return Err(GeometryError::IncompleteBoundary {
                found: distinct,
                required: MIN_BOUNDARY_POINTS,
            });
        }

        let area_square_meters = polygon_area(&points);
        if area_square_meters <= 0.0 {
            return Err(GeometryError::DegenerateGeometry);
        }

        Ok(Self {
            points,
            area_square_meters,
        })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }

    pub fn area_square_meters(&self) -> f64 {
        self.area_square_meters
    }

    pub fn area_hectares(&self) -> f64 {
        square_meters_to_hectares(self.area_square_meters)
    }

    pub fn perimeter_meters(&self) -> f64 {
        perimeter(&self.points)
    }

    /// Open ring of `[longitude, latitude]` pairs, the order providers expect
    pub fn ring(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(GeoPoint::lng_lat).collect()
    }
}

/// Count of points at pairwise-distinct coordinates
pub(crate) fn distinct_positions(points: &[GeoPoint]) -> usize {
    points
        .iter()
        .map(|p| (p.latitude.to_bits(), p.longitude.to_bits()))
        .collect::<HashSet<_>>()
        .len()
}

/// Lifecycle state of a field
///
/// Transitions only move forward: `unmapped → mapped → analyzed`.
/// Remapping an analyzed field keeps it analyzed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    #[default]
    Unmapped,
    Mapped,
    Analyzed,
}

impl FieldState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldState::Unmapped => "unmapped",
            FieldState::Mapped => "mapped",
            FieldState::Analyzed => "analyzed",
        }
    }

    /// State after a valid boundary has been attached
    pub fn on_boundary_saved(self) -> FieldState {
        match self {
            FieldState::Unmapped => FieldState::Mapped,
            other => other,
        }
    }

    /// State after an analysis completed
    pub fn on_analysis_completed(self) -> Result<FieldState, InvalidTransition> {
        match self {
            FieldState::Unmapped => Err(InvalidTransition {
                from: self,
                action: "analyze",
            }),
            FieldState::Mapped | FieldState::Analyzed => Ok(FieldState::Analyzed),
        }
    }

    pub fn can_analyze(&self) -> bool {
        !matches!(self, FieldState::Unmapped)
    }
}

impl fmt::Display for FieldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unmapped" => Ok(FieldState::Unmapped),
            "mapped" => Ok(FieldState::Mapped),
            "analyzed" => Ok(FieldState::Analyzed),
            other => Err(format!("unknown field state: {}", other)),
        }
    }
}

/// A farm field: the anchor for boundary, analyses and recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: Uuid,
    pub name: String,
    pub crop_type: Option<CropType>,
    pub notes: Option<String>,
    pub boundary: Option<FieldBoundary>,
    pub area_hectares: Option<f64>,
    pub state: FieldState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Descriptive data supplied when a field is created
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub name: String,
    #[serde(default)]
    pub crop_type: Option<CropType>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Field {
    /// New field; mapped when a boundary is supplied, unmapped otherwise
    pub fn new(metadata: FieldMetadata, boundary: Option<FieldBoundary>, now: DateTime<Utc>) -> Self {
        let mut field = Self {
            id: Uuid::new_v4(),
            name: metadata.name.trim().to_string(),
            crop_type: metadata.crop_type,
            notes: metadata.notes,
            boundary: None,
            area_hectares: None,
            state: FieldState::Unmapped,
            created_at: now,
            updated_at: now,
        };
        if let Some(boundary) = boundary {
            field.replace_boundary(boundary, now);
        }
        field
    }

    /// Swap in a new boundary, returning the previous one
    ///
    /// Analysis history is untouched and an analyzed field stays analyzed.
    pub fn replace_boundary(
        &mut self,
        boundary: FieldBoundary,
        now: DateTime<Utc>,
    ) -> Option<FieldBoundary> {
        self.area_hectares = Some(boundary.area_hectares());
        self.state = self.state.on_boundary_saved();
        self.updated_at = now;
        self.boundary.replace(boundary)
    }
}

/// A boundary that was replaced by a remap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryRevision {
    pub id: Uuid,
    pub field_id: Uuid,
    pub boundary: FieldBoundary,
    pub area_hectares: f64,
    pub replaced_at: DateTime<Utc>,
}

impl BoundaryRevision {
    pub fn new(field_id: Uuid, boundary: FieldBoundary, replaced_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            field_id,
            area_hectares: boundary.area_hectares(),
            boundary,
            replaced_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn triangle() -> Vec<GeoPoint> {
        vec![pt(20.0, 78.0), pt(20.0, 78.001), pt(20.001, 78.0)]
    }

    #[test]
    fn test_boundary_requires_three_distinct_points() {
        let err = FieldBoundary::new(vec![pt(20.0, 78.0), pt(20.0, 78.001), pt(20.0, 78.001)])
            .unwrap_err();
        assert_eq!(
            err,
            GeometryError::IncompleteBoundary {
                found: 2,
                required: 3
            }
        );
    }

    #[test]
    fn test_boundary_rejects_collinear_points() {
        let err = FieldBoundary::new(vec![pt(20.0, 78.0), pt(20.001, 78.0), pt(20.002, 78.0)])
            .unwrap_err();
        assert_eq!(err, GeometryError::DegenerateGeometry);
    }

    #[test]
    fn test_state_machine_is_monotonic() {
        assert_eq!(FieldState::Unmapped.on_boundary_saved(), FieldState::Mapped);
        assert_eq!(FieldState::Analyzed.on_boundary_saved(), FieldState::Analyzed);
        assert_eq!(
            FieldState::Mapped.on_analysis_completed(),
            Ok(FieldState::Analyzed)
        );
        assert_eq!(
            FieldState::Analyzed.on_analysis_completed(),
            Ok(FieldState::Analyzed)
        );
        assert!(FieldState::Unmapped.on_analysis_completed().is_err());
    }

    #[test]
    fn test_remap_keeps_analyzed_state() {
        let now = Utc::now();
        let boundary = FieldBoundary::new(triangle()).unwrap();
        let mut field = Field::new(
            FieldMetadata {
                name: " Wheat strip ".to_string(),
                ..Default::default()
            },
            Some(boundary.clone()),
            now,
        );
        assert_eq!(field.name, "Wheat strip");
        assert_eq!(field.state, FieldState::Mapped);

        field.state = FieldState::Analyzed;
        let bigger = FieldBoundary::new(vec![
            pt(20.0, 78.0),
            pt(20.0, 78.002),
            pt(20.002, 78.002),
            pt(20.002, 78.0),
        ])
        .unwrap();
        let previous = field.replace_boundary(bigger, now);
        assert_eq!(previous, Some(boundary));
        assert_eq!(field.state, FieldState::Analyzed);
        assert!(field.area_hectares.unwrap() > 4.0);
    }

    #[test]
    fn test_state_round_trips_through_str() {
        for state in [FieldState::Unmapped, FieldState::Mapped, FieldState::Analyzed] {
            assert_eq!(state.as_str().parse::<FieldState>().unwrap(), state);
        }
    }
}
