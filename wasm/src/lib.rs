//! WebAssembly module for the Field Health Monitoring Platform
//!
//! Provides client-side computation for:
//! - Distances and field area while a boundary is being drawn
//! - Live capture sessions for map taps and walked boundaries
//! - Health and water stress classification of index values
//!
//! Everything delegates to `shared`, so the map UI shows the same numbers
//! the server stores.

use chrono::DateTime;
use shared::{
    CaptureMode, CaptureSession, CropCalendar, CropType, FieldBoundary, GeoPoint, PolygonGeometry,
    PositionSample, QualityCurve,
};
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

// ============================================================================
// Geodesy
// ============================================================================

/// Great-circle distance in meters between two coordinates
#[wasm_bindgen]
pub fn haversine_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    shared::haversine_distance_degrees(lat1, lon1, lat2, lon2)
}

/// Area in hectares of a GeoJSON polygon, without boundary validation
///
/// Suitable for a live readout while points are still being placed; a ring
/// that is not yet a valid boundary yields 0.
#[wasm_bindgen]
pub fn polygon_area_hectares(geojson: &str) -> Result<f64, JsValue> {
    let geometry: PolygonGeometry = serde_json::from_str(geojson)
        .map_err(|e| js_error(format!("Invalid GeoJSON: {}", e)))?;
    let points = geometry.to_points().map_err(js_error)?;
    Ok(shared::square_meters_to_hectares(shared::polygon_area(&points)))
}

/// Validate a GeoJSON polygon as a field boundary
///
/// Returns `{ area_square_meters, area_hectares, perimeter_meters }`.
#[wasm_bindgen]
pub fn boundary_summary(geojson: &str) -> Result<String, JsValue> {
    let boundary: FieldBoundary = serde_json::from_str(geojson).map_err(js_error)?;
    Ok(serde_json::json!({
        "area_square_meters": boundary.area_square_meters(),
        "area_hectares": boundary.area_hectares(),
        "perimeter_meters": boundary.perimeter_meters(),
    })
    .to_string())
}

// ============================================================================
// Capture
// ============================================================================

/// A boundary being drawn in the browser
#[wasm_bindgen]
pub struct BoundaryCapture {
    session: CaptureSession,
}

#[wasm_bindgen]
impl BoundaryCapture {
    /// Session placing one point per map tap
    #[wasm_bindgen(js_name = manual)]
    pub fn manual() -> BoundaryCapture {
        BoundaryCapture {
            session: CaptureSession::manual(),
        }
    }

    /// Session fed by `navigator.geolocation` samples
    #[wasm_bindgen(js_name = continuous)]
    pub fn continuous(min_displacement_meters: f64) -> Result<BoundaryCapture, JsValue> {
        let session = CaptureSession::new(CaptureMode::Continuous {
            min_displacement_meters,
        })
        .map_err(js_error)?;
        Ok(BoundaryCapture { session })
    }

    /// Index of the placed point
    #[wasm_bindgen(js_name = addPoint)]
    pub fn add_point(&mut self, latitude: f64, longitude: f64) -> Result<usize, JsValue> {
        let point = GeoPoint::new(latitude, longitude).map_err(js_error)?;
        self.session.add_point(point).map_err(js_error)
    }

    /// Offer a geolocation fix; true when it became a point
    #[wasm_bindgen(js_name = ingestSample)]
    pub fn ingest_sample(
        &mut self,
        latitude: f64,
        longitude: f64,
        accuracy_meters: Option<f64>,
        timestamp_millis: f64,
    ) -> Result<bool, JsValue> {
        let timestamp = DateTime::from_timestamp_millis(timestamp_millis as i64)
            .ok_or_else(|| js_error("Invalid sample timestamp"))?;
        let point = PositionSample {
            latitude,
            longitude,
            accuracy_meters,
            timestamp,
        }
        .into_point()
        .map_err(js_error)?;
        let outcome = self.session.ingest_sample(point).map_err(js_error)?;
        Ok(matches!(outcome, shared::SampleOutcome::Accepted { .. }))
    }

    #[wasm_bindgen(js_name = movePoint)]
    pub fn move_point(&mut self, index: usize, latitude: f64, longitude: f64) -> Result<(), JsValue> {
        self.session
            .move_point(index, latitude, longitude)
            .map_err(js_error)
    }

    /// False when there was nothing to remove
    #[wasm_bindgen(js_name = undoLastPoint)]
    pub fn undo_last_point(&mut self) -> bool {
        self.session.undo_last_point().is_some()
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }

    /// Keep the captured points and continue by tapping
    #[wasm_bindgen(js_name = fallBackToManual)]
    pub fn fall_back_to_manual(&mut self, reason: &str) {
        web_sys::console::warn_1(&JsValue::from_str(&format!(
            "Position unavailable, continuing manually: {}",
            reason
        )));
        self.session.fall_back_to_manual(reason);
    }

    #[wasm_bindgen(js_name = pointCount)]
    pub fn point_count(&self) -> usize {
        self.session.len()
    }

    #[wasm_bindgen(js_name = areaHectares)]
    pub fn area_hectares(&self) -> f64 {
        self.session.area_hectares()
    }

    /// Points, area and mode as JSON
    pub fn snapshot(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.snapshot()).map_err(js_error)
    }

    /// Validated boundary as a closed GeoJSON polygon, ready to submit
    #[wasm_bindgen(js_name = toGeoJson)]
    pub fn to_geojson(&self) -> Result<String, JsValue> {
        let finalized = self.session.finalize().map_err(js_error)?;
        serde_json::to_string(&PolygonGeometry::from(finalized.boundary)).map_err(js_error)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Health band for an NDVI value
#[wasm_bindgen]
pub fn classify_health(ndvi: f64) -> String {
    shared::classify_health(ndvi).to_string()
}

/// Water stress band for an NDVI value
#[wasm_bindgen]
pub fn classify_water_stress(ndvi: f64) -> String {
    shared::classify_water_stress(ndvi).to_string()
}

/// Imagery quality score under the default curve
#[wasm_bindgen]
pub fn imagery_quality_score(cloud_cover_percent: f64) -> f64 {
    QualityCurve::default().score(cloud_cover_percent)
}

/// Crop stage on an ISO date under the built-in calendar
#[wasm_bindgen]
pub fn crop_stage(crop: &str, iso_date: &str) -> Result<String, JsValue> {
    let crop: CropType = crop.parse().map_err(js_error)?;
    let date = iso_date
        .parse::<chrono::NaiveDate>()
        .map_err(|e| js_error(format!("Invalid date: {}", e)))?;
    Ok(CropCalendar::default().stage_for(crop, date).to_string())
}
