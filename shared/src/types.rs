//! Common types used across the platform

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::validation::validate_coordinate;

/// A captured WGS84 position
///
/// Points are immutable once captured. The only in-place change is a drag
/// adjustment made through a capture session, which replaces the
/// coordinates and leaves accuracy and capture time untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy_meters: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

impl GeoPoint {
    /// Create a point without capture metadata (map taps, GeoJSON input)
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeometryError> {
        check_coordinate(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
            horizontal_accuracy_meters: None,
            captured_at: None,
        })
    }

    /// Create a point from a sensor fix
    pub fn captured(
        latitude: f64,
        longitude: f64,
        horizontal_accuracy_meters: Option<f64>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, GeometryError> {
        check_coordinate(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
            horizontal_accuracy_meters,
            captured_at: Some(captured_at),
        })
    }

    /// Whether two points sit on exactly the same coordinates
    pub fn same_position(&self, other: &GeoPoint) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    /// `[longitude, latitude]`, the GeoJSON axis order
    pub fn lng_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    pub(crate) fn reposition(&mut self, latitude: f64, longitude: f64) -> Result<(), GeometryError> {
        check_coordinate(latitude, longitude)?;
        self.latitude = latitude;
        self.longitude = longitude;
        Ok(())
    }
}

/// A raw sample delivered by a position source (device GPS, receiver feed)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_meters: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn into_point(self) -> Result<GeoPoint, GeometryError> {
        GeoPoint::captured(
            self.latitude,
            self.longitude,
            self.accuracy_meters,
            self.timestamp,
        )
    }
}

fn check_coordinate(latitude: f64, longitude: f64) -> Result<(), GeometryError> {
    validate_coordinate(latitude, longitude).map_err(|reason| GeometryError::InvalidCoordinate {
        latitude,
        longitude,
        reason,
    })
}
