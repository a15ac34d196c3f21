//! GeoJSON wire format for field boundaries
//!
//! A boundary travels as a single-ring `Polygon` geometry of
//! `[longitude, latitude]` pairs. Output rings are closed (first point
//! repeated) as GeoJSON requires; input accepts open or closed rings.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::models::FieldBoundary;
use crate::types::GeoPoint;

const POLYGON: &str = "Polygon";

/// GeoJSON Polygon geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

impl PolygonGeometry {
    /// Closed polygon from an open ring of `[lng, lat]` pairs
    pub fn from_open_ring(mut ring: Vec<[f64; 2]>) -> Self {
        if let Some(first) = ring.first().copied() {
            if ring.len() == 1 || ring.last() != Some(&first) {
                ring.push(first);
            }
        }
        Self {
            kind: POLYGON.to_string(),
            coordinates: vec![ring],
        }
    }

    /// Points of the outer ring with the closing duplicate removed
    pub fn to_points(&self) -> Result<Vec<GeoPoint>, GeometryError> {
        if self.kind != POLYGON {
            return Err(GeometryError::InvalidGeoJson(format!(
                "expected type Polygon, found {}",
                self.kind
            )));
        }
        let ring = match self.coordinates.as_slice() {
            [ring] => ring,
            [] => {
                return Err(GeometryError::InvalidGeoJson(
                    "polygon has no rings".to_string(),
                ))
            }
            _ => {
                return Err(GeometryError::InvalidGeoJson(
                    "polygons with holes are not supported".to_string(),
                ))
            }
        };

        let mut coordinates = ring.as_slice();
        if coordinates.len() > 1 && coordinates.first() == coordinates.last() {
            coordinates = &coordinates[..coordinates.len() - 1];
        }

        coordinates
            .iter()
            .map(|[lng, lat]| GeoPoint::new(*lat, *lng))
            .collect()
    }
}

impl From<FieldBoundary> for PolygonGeometry {
    fn from(boundary: FieldBoundary) -> Self {
        PolygonGeometry::from_open_ring(boundary.ring())
    }
}

impl TryFrom<PolygonGeometry> for FieldBoundary {
    type Error = GeometryError;

    fn try_from(geometry: PolygonGeometry) -> Result<Self, Self::Error> {
        FieldBoundary::new(geometry.to_points()?)
    }
}
