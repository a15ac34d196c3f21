//! Geodesy utilities: great-circle distance and field-scale polygon area
//!
//! Area uses a local equirectangular projection around the ring's mean
//! latitude followed by the shoelace formula. For fields under ~20 ha the
//! error against an ellipsoidal computation stays well under one percent.

use crate::types::GeoPoint;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Rings enclosing less than this are treated as collinear
///
/// This includes non-collinear rings smaller than 10 cm by 10 cm, which
/// sit below GNSS precision: `polygon_area` returns 0 for them and
/// boundary validation rejects them as degenerate.
pub const DEGENERATE_AREA_EPSILON_M2: f64 = 0.01;

/// Great-circle distance between two points in meters
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_distance_degrees(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Great-circle distance between two `(lat, lon)` pairs in degrees
pub fn haversine_distance_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    // abs() keeps d(a, b) and d(b, a) bit-identical
    let d_lat = (lat2 - lat1).abs().to_radians();
    let d_lon = (lon2 - lon1).abs().to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Area in square meters enclosed by an implicitly closed ring of points
///
/// Returns an unsigned magnitude, so traversal direction and the choice of
/// starting vertex do not matter. Rings with fewer than three points or
/// with all points on one line enclose nothing and yield 0.
pub fn polygon_area(points: &[GeoPoint]) -> f64 {
    let ring: Vec<(f64, f64)> = points.iter().map(|p| (p.latitude, p.longitude)).collect();
    polygon_area_degrees(&ring)
}

/// Same as [`polygon_area`] over raw `(lat, lon)` pairs in degrees
pub fn polygon_area_degrees(ring: &[(f64, f64)]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }

    let (origin_lat, origin_lon) = ring[0];
    let mean_lat = ring.iter().map(|(lat, _)| lat).sum::<f64>() / ring.len() as f64;
    let lon_scale = mean_lat.to_radians().cos();

    let projected: Vec<(f64, f64)> = ring
        .iter()
        .map(|&(lat, lon)| {
            let x = EARTH_RADIUS_METERS * unwrap_longitude(lon - origin_lon).to_radians() * lon_scale;
            let y = EARTH_RADIUS_METERS * (lat - origin_lat).to_radians();
            (x, y)
        })
        .collect();

    let mut twice_area = 0.0;
    for i in 0..projected.len() {
        let (x1, y1) = projected[i];
        let (x2, y2) = projected[(i + 1) % projected.len()];
        twice_area += x1 * y2 - x2 * y1;
    }

    let area = (twice_area / 2.0).abs();
    if area < DEGENERATE_AREA_EPSILON_M2 {
        0.0
    } else {
        area
    }
}

/// Convert square meters to hectares
pub fn square_meters_to_hectares(square_meters: f64) -> f64 {
    square_meters / SQUARE_METERS_PER_HECTARE
}

/// Length of an open path in meters
pub fn path_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Perimeter of an implicitly closed ring in meters
pub fn perimeter(points: &[GeoPoint]) -> f64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 3 => {
            path_length(points) + haversine_distance(last, first)
        }
        _ => path_length(points),
    }
}

/// Map a longitude delta into [-180, 180) so rings crossing the antimeridian stay contiguous
fn unwrap_longitude(delta: f64) -> f64 {
    if delta >= 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}
