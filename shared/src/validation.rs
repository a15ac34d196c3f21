//! Validation utilities for the Field Health Monitoring Platform

use crate::models::RawIndices;

// ============================================================================
// Coordinate Validations
// ============================================================================

/// Validate a WGS84 latitude/longitude pair
pub fn validate_coordinate(latitude: f64, longitude: f64) -> Result<(), &'static str> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err("Coordinates must be finite numbers");
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err("Latitude must be between -90 and 90 degrees");
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err("Longitude must be between -180 and 180 degrees");
    }
    Ok(())
}

/// Validate a continuous-capture displacement threshold
pub fn validate_min_displacement(meters: f64) -> Result<(), &'static str> {
    if !meters.is_finite() || meters < 0.0 {
        return Err("Minimum displacement must be a non-negative number of meters");
    }
    Ok(())
}

// ============================================================================
// Vegetation Index Validations
// ============================================================================

/// Validate a raw provider payload before it is classified
///
/// Normalized-difference indices live in [-1, 1], the radar index is a
/// non-negative ratio and cloud cover is a percentage.
pub fn validate_raw_indices(raw: &RawIndices) -> Result<(), &'static str> {
    let normalized = [raw.ndvi, raw.msavi2, raw.ndre, raw.ndmi];
    if normalized.iter().any(|v| !v.is_finite()) {
        return Err("Vegetation indices must be finite numbers");
    }
    if normalized.iter().any(|v| !(-1.0..=1.0).contains(v)) {
        return Err("Normalized vegetation indices must be between -1 and 1");
    }
    if !raw.rvi.is_finite() || raw.rvi < 0.0 {
        return Err("RVI must be a non-negative number");
    }
    if let Some(soc) = raw.soc_vis {
        if !soc.is_finite() {
            return Err("SOC_VIS must be a finite number");
        }
    }
    if !raw.cloud_cover_percent.is_finite() || !(0.0..=100.0).contains(&raw.cloud_cover_percent) {
        return Err("Cloud cover must be between 0 and 100 percent");
    }
    Ok(())
}

/// Validate a field name
pub fn validate_field_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Field name cannot be empty");
    }
    if trimmed.chars().count() > 120 {
        return Err("Field name must be at most 120 characters");
    }
    Ok(())
}
