//! HTTP API tests
//!
//! Requests go through the full router with the in-memory repository:
//! - Status codes and error bodies for the field lifecycle
//! - GeoJSON boundaries in and out
//! - Capture sessions over HTTP

mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use common::*;
use field_health_backend::{
    create_app, external::VegetationIndexProvider, storage::InMemoryFieldRepository, AppState,
    Config,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app_with(provider: Arc<dyn VegetationIndexProvider>) -> Router {
    let mut config = Config::default();
    config.provider.timeout_secs = 1;
    let state = AppState::new(config, Arc::new(InMemoryFieldRepository::new()), provider).unwrap();
    create_app(state)
}

fn app() -> Router {
    app_with(Arc::new(CountingProvider::new(indices(0.25, 20.0))))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Closed GeoJSON ring of a square with `side_meters`
fn square_geojson(lat: f64, lon: f64, side_meters: f64) -> Value {
    let ring: Vec<[f64; 2]> = square_points(lat, lon, side_meters)
        .iter()
        .chain(square_points(lat, lon, side_meters).first())
        .map(|p| p.lng_lat())
        .collect();
    json!({ "type": "Polygon", "coordinates": [ring] })
}

async fn create_mapped_field(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/fields",
        Some(json!({
            "name": "Tubewell field",
            "crop_type": "wheat",
            "boundary": square_geojson(26.45, 80.33, 100.0),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

// ============================================================================
// Fields
// ============================================================================

#[tokio::test]
async fn test_health_reports_backends() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["index_provider"], "counting");
    assert_eq!(body["open_capture_sessions"], 0);
}

#[tokio::test]
async fn test_create_field_returns_area_and_closed_ring() {
    let app = app();
    let id = create_mapped_field(&app).await;

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/fields/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "mapped");
    let hectares = body["area_hectares"].as_f64().unwrap();
    assert!((hectares - 1.0).abs() < 0.01);
    assert!(body["perimeter_meters"].as_f64().unwrap() > 390.0);

    let ring = body["boundary"]["coordinates"][0].as_array().unwrap();
    assert_eq!(ring.len(), 5);
    assert_eq!(ring.first(), ring.last());
}

#[tokio::test]
async fn test_collinear_boundary_is_unprocessable() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/fields",
        Some(json!({
            "name": "Fence line",
            "boundary": {
                "type": "Polygon",
                "coordinates": [[[80.0, 26.0], [80.001, 26.0], [80.002, 26.0]]]
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "DEGENERATE_GEOMETRY");
    assert!(body["error"]["message_hi"].as_str().is_some());
}

#[tokio::test]
async fn test_two_point_boundary_is_incomplete() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/fields",
        Some(json!({
            "name": "Two pegs",
            "boundary": {
                "type": "Polygon",
                "coordinates": [[[80.0, 26.0], [80.001, 26.001]]]
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INCOMPLETE_BOUNDARY");
}

#[tokio::test]
async fn test_unknown_field_is_not_found() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/fields/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// ============================================================================
// Analyses
// ============================================================================

#[tokio::test]
async fn test_analysis_flow() {
    let app = app();
    let id = create_mapped_field(&app).await;
    let uri = format!("/api/v1/fields/{}/analyses", id);
    let request = json!({ "analysis_date": "2024-12-10" });

    let (status, body) = send(&app, Method::POST, &uri, Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["reused"], false);
    assert_eq!(body["analysis"]["status"], "completed");
    assert_eq!(body["analysis"]["classification"]["health_status"], "poor");
    let recommendations = body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 2);
    assert_eq!(recommendations[0]["category"], "fertilizer");
    assert_eq!(recommendations[1]["category"], "irrigation");

    let (status, again) = send(&app, Method::POST, &uri, Some(request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["reused"], true);
    assert_eq!(again["analysis"]["id"], body["analysis"]["id"]);

    let (_, field) = send(&app, Method::GET, &format!("/api/v1/fields/{}", id), None).await;
    assert_eq!(field["state"], "analyzed");
    assert_eq!(field["latest_analysis"]["id"], body["analysis"]["id"]);

    let recommendation_id = recommendations[0]["id"].as_str().unwrap();
    let (status, marked) = send(
        &app,
        Method::POST,
        &format!("/api/v1/recommendations/{}/implemented", recommendation_id),
        Some(json!({ "feedback": "Soil test booked" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["implemented"], true);
    assert_eq!(marked["farmer_feedback"], "Soil test booked");
}

#[tokio::test]
async fn test_provider_timeout_is_bad_gateway_with_record() {
    let app = app_with(Arc::new(StalledProvider));
    let id = create_mapped_field(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/fields/{}/analyses", id),
        Some(json!({ "analysis_date": "2024-12-10" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "ANALYSIS_FAILED");
    assert_eq!(body["analysis"]["status"], "failed");

    let (_, field) = send(&app, Method::GET, &format!("/api/v1/fields/{}", id), None).await;
    assert_eq!(field["state"], "mapped");
}

#[tokio::test]
async fn test_draft_field_analysis_conflicts() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/fields",
        Some(json!({ "name": "Not yet walked", "crop_type": "rice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["state"], "unmapped");
    let id = body["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/fields/{}/analyses", id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn test_remap_records_revision() {
    let app = app();
    let id = create_mapped_field(&app).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/fields/{}/boundary", id),
        Some(json!({ "boundary": square_geojson(26.45, 80.33, 200.0) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!((body["area_hectares"].as_f64().unwrap() - 4.0).abs() < 0.05);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/fields/{}/boundaries", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revisions"].as_array().unwrap().len(), 1);
}

// ============================================================================
// Capture
// ============================================================================

#[tokio::test]
async fn test_manual_capture_over_http() {
    let app = app();
    let (status, session) = send(
        &app,
        Method::POST,
        "/api/v1/capture/sessions",
        Some(json!({ "name": "Tapped on map", "crop_type": "maize" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["mode"]["mode"], "manual");
    let base = format!("/api/v1/capture/sessions/{}", session["id"].as_str().unwrap());

    for p in square_points(12.97, 77.59, 50.0) {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("{}/points", base),
            Some(json!({ "latitude": p.latitude, "longitude": p.longitude })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, view) = send(&app, Method::DELETE, &format!("{}/points/last", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["points"].as_array().unwrap().len(), 3);

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("{}/points/7", base),
        Some(json!({ "latitude": 12.97, "longitude": 77.59 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, field) = send(&app, Method::POST, &format!("{}/finalize", base), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(field["state"], "mapped");
    assert_eq!(field["crop_type"], "maize");

    let (status, _) = send(&app, Method::GET, &base, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_samples_after_fallback_are_refused() {
    let app = app();
    let (_, session) = send(
        &app,
        Method::POST,
        "/api/v1/capture/sessions",
        Some(json!({ "name": "Walk", "mode": "continuous" })),
    )
    .await;
    let base = format!("/api/v1/capture/sessions/{}", session["id"].as_str().unwrap());

    let sample = json!({
        "latitude": 12.97,
        "longitude": 77.59,
        "accuracy_meters": 4.0,
        "timestamp": "2024-07-01T06:30:00Z"
    });
    let (status, body) = send(&app, Method::POST, &format!("{}/samples", base), Some(sample.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["outcome"], "accepted");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("{}/fallback", base),
        Some(json!({ "reason": "GPS too weak under trees" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fallback_reason"], "GPS too weak under trees");

    let (status, body) = send(&app, Method::POST, &format!("{}/samples", base), Some(sample)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "POSITION_SOURCE_UNAVAILABLE");

    let (status, _) = send(&app, Method::DELETE, &base, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
