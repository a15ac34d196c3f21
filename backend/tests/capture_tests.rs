//! Boundary capture tests
//!
//! Capture sessions driven through the registry:
//! - Walking a field with a followed position source
//! - Jitter below the displacement threshold is suppressed
//! - Losing the position source falls back to manual placement
//! - A failed save keeps the session and its points

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::*;
use field_health_backend::error::AppError;
use field_health_backend::external::{ChannelPositionSource, PositionError, PositionFeed};
use field_health_backend::services::capture::{
    CaptureEventKind, CaptureModeKind, CaptureView, OpenSessionInput, PointInput,
};
use field_health_backend::services::CaptureRegistry;
use shared::{CaptureMode, CropType, FieldState, PositionSample, SampleOutcome};
use uuid::Uuid;

const ORIGIN_LAT: f64 = 18.52;
const ORIGIN_LON: f64 = 73.85;

/// Sample `north`/`east` meters from the origin
fn sample_at(north: f64, east: f64) -> PositionSample {
    let d_lat = meters_to_lat_degrees(north);
    let d_lon = meters_to_lat_degrees(east) / ORIGIN_LAT.to_radians().cos();
    PositionSample {
        latitude: ORIGIN_LAT + d_lat,
        longitude: ORIGIN_LON + d_lon,
        accuracy_meters: Some(3.0),
        timestamp: Utc::now(),
    }
}

fn point_at(north: f64, east: f64) -> PointInput {
    let sample = sample_at(north, east);
    PointInput {
        latitude: sample.latitude,
        longitude: sample.longitude,
    }
}

/// Walk three sides of a 40 m square, 10 m per step, with jitter in between
fn walk_three_sides() -> Vec<PositionSample> {
    let mut path = vec![(0.0, 0.0), (0.5, 0.8)];
    for step in 1..=4 {
        let east = step as f64 * 10.0;
        path.push((0.0, east));
        path.push((1.0, east + 1.0));
    }
    for step in 1..=4 {
        let north = step as f64 * 10.0;
        path.push((north, 40.0));
        path.push((north - 0.7, 39.5));
    }
    for step in 1..=4 {
        let east = 40.0 - step as f64 * 10.0;
        path.push((40.0, east));
    }
    path.into_iter().map(|(n, e)| sample_at(n, e)).collect()
}

/// Poll a session until `done` holds
async fn wait_for(
    registry: &CaptureRegistry,
    id: Uuid,
    done: impl Fn(&CaptureView) -> bool,
) -> CaptureView {
    for _ in 0..200 {
        let view = registry.snapshot(id).await.unwrap();
        if done(&view) {
            return view;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("capture session did not reach the expected state");
}

async fn follow_channel(registry: &CaptureRegistry, id: Uuid) -> PositionFeed {
    let (feed, source) = ChannelPositionSource::channel(32);
    registry.follow(id, Box::new(source)).await.unwrap();
    feed
}

// ============================================================================
// Continuous capture
// ============================================================================

#[tokio::test]
async fn test_walked_boundary_becomes_mapped_field() {
    let registry = CaptureRegistry::new(5.0);
    let service = field_service(Arc::new(CountingProvider::new(indices(0.6, 0.0))));
    let view = registry
        .open(OpenSessionInput {
            mode: CaptureModeKind::Continuous,
            name: "Walked field".to_string(),
            crop_type: Some(CropType::Groundnut),
            ..Default::default()
        })
        .await
        .unwrap();
    let id = view.id;

    let feed = follow_channel(&registry, id).await;
    for sample in walk_three_sides() {
        assert!(feed.send(sample).await);
    }
    drop(feed);

    let view = wait_for(&registry, id, |v| !v.events.is_empty()).await;
    assert_eq!(view.events[0].kind, CaptureEventKind::PositionSourceEnded);
    assert!(!view.following_position_source);
    // Start, then four accepted steps per side; every jitter sample dropped
    assert_eq!(view.snapshot.points.len(), 13);
    assert!(view.snapshot.is_complete);
    let area = view.snapshot.area_square_meters;
    assert!((area - 1600.0).abs() < 16.0, "area was {} m2", area);

    let field = registry.finalize(id, &service).await.unwrap();
    assert_eq!(field.state, FieldState::Mapped);
    assert_eq!(field.crop_type, Some(CropType::Groundnut));
    assert!((field.area_hectares.unwrap() - 0.16).abs() < 0.002);
    assert_eq!(registry.open_sessions().await, 0);
    assert!(service.get_field(field.id).await.is_ok());
}

#[tokio::test]
async fn test_sample_within_threshold_is_suppressed() {
    let registry = CaptureRegistry::new(5.0);
    let id = registry.open_continuous("Jitter check").await.unwrap().id;

    let (first, _) = registry.ingest_sample(id, sample_at(0.0, 0.0)).await.unwrap();
    assert_eq!(first, SampleOutcome::Accepted { index: 0 });

    let (jitter, view) = registry.ingest_sample(id, sample_at(3.0, 0.0)).await.unwrap();
    match jitter {
        SampleOutcome::Suppressed { distance_meters } => {
            assert!((distance_meters - 3.0).abs() < 0.05)
        }
        other => panic!("expected suppression, got {:?}", other),
    }
    assert_eq!(view.snapshot.points.len(), 1);

    let (moved, _) = registry.ingest_sample(id, sample_at(6.0, 0.0)).await.unwrap();
    assert_eq!(moved, SampleOutcome::Accepted { index: 1 });
}

#[tokio::test]
async fn test_custom_threshold_applies() {
    let registry = CaptureRegistry::new(5.0);
    let id = registry
        .open(OpenSessionInput {
            mode: CaptureModeKind::Continuous,
            min_displacement_meters: Some(20.0),
            name: "Coarse walk".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id;

    registry.ingest_sample(id, sample_at(0.0, 0.0)).await.unwrap();
    let (outcome, _) = registry.ingest_sample(id, sample_at(15.0, 0.0)).await.unwrap();
    assert!(matches!(outcome, SampleOutcome::Suppressed { .. }));

    let invalid = registry
        .open(OpenSessionInput {
            mode: CaptureModeKind::Continuous,
            min_displacement_meters: Some(-1.0),
            name: "Broken".to_string(),
            ..Default::default()
        })
        .await;
    assert!(matches!(invalid, Err(AppError::Geometry(_))));
}

#[tokio::test]
async fn test_manual_session_cannot_follow_source() {
    let registry = CaptureRegistry::new(5.0);
    let id = registry
        .open(OpenSessionInput {
            name: "Tapped field".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id;

    let (_feed, source) = ChannelPositionSource::channel(1);
    let result = registry.follow(id, Box::new(source)).await;
    assert!(matches!(result, Err(AppError::Geometry(_))));

    let sample = registry.ingest_sample(id, sample_at(0.0, 0.0)).await;
    assert!(matches!(sample, Err(AppError::Geometry(_))));
}

// ============================================================================
// Fallback
// ============================================================================

#[tokio::test]
async fn test_source_failure_falls_back_to_manual() {
    let registry = CaptureRegistry::new(5.0);
    let service = field_service(Arc::new(CountingProvider::new(indices(0.6, 0.0))));
    let id = registry.open_continuous("Lost fix").await.unwrap().id;

    let feed = follow_channel(&registry, id).await;
    feed.send(sample_at(0.0, 0.0)).await;
    feed.send(sample_at(0.0, 30.0)).await;
    feed.fail(PositionError::Unavailable("no satellites".to_string()))
        .await;

    let view = wait_for(&registry, id, |v| !v.events.is_empty()).await;
    assert_eq!(view.events[0].kind, CaptureEventKind::PositionSourceUnavailable);
    assert_eq!(view.snapshot.mode, CaptureMode::Manual);
    assert!(view.snapshot.fallback_reason.is_some());
    assert_eq!(view.snapshot.points.len(), 2);

    // Later samples are refused, manual placement continues the boundary
    let refused = registry.ingest_sample(id, sample_at(30.0, 30.0)).await;
    assert!(matches!(refused, Err(AppError::PositionSourceUnavailable(_))));

    let view = registry.add_point(id, point_at(30.0, 30.0)).await.unwrap();
    assert_eq!(view.snapshot.points.len(), 3);
    assert!(view.snapshot.is_complete);

    let field = registry.finalize(id, &service).await.unwrap();
    assert_eq!(field.state, FieldState::Mapped);
}

#[tokio::test]
async fn test_permission_denied_keeps_points() {
    let registry = CaptureRegistry::new(5.0);
    let id = registry.open_continuous("Denied").await.unwrap().id;

    let feed = follow_channel(&registry, id).await;
    feed.send(sample_at(0.0, 0.0)).await;
    feed.fail(PositionError::PermissionDenied).await;

    let view = wait_for(&registry, id, |v| !v.events.is_empty()).await;
    assert_eq!(view.snapshot.points.len(), 1);
    assert_eq!(view.events[0].message, "location permission denied");
}

#[tokio::test]
async fn test_explicit_fallback_stops_following() {
    let registry = CaptureRegistry::new(5.0);
    let id = registry.open_continuous("Manual switch").await.unwrap().id;

    let feed = follow_channel(&registry, id).await;
    feed.send(sample_at(0.0, 0.0)).await;
    wait_for(&registry, id, |v| v.snapshot.points.len() == 1).await;

    let view = registry
        .fall_back_to_manual(id, Default::default())
        .await
        .unwrap();
    assert_eq!(view.snapshot.mode, CaptureMode::Manual);
    assert!(!view.following_position_source);

    // Samples sent after the switch are not applied
    tokio::time::sleep(Duration::from_millis(20)).await;
    feed.send(sample_at(0.0, 50.0)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let view = registry.snapshot(id).await.unwrap();
    assert_eq!(view.snapshot.points.len(), 1);
}

// ============================================================================
// Finalize
// ============================================================================

#[tokio::test]
async fn test_incomplete_or_collinear_boundary_is_rejected() {
    let registry = CaptureRegistry::new(5.0);
    let service = field_service(Arc::new(CountingProvider::new(indices(0.6, 0.0))));
    let id = registry
        .open(OpenSessionInput {
            name: "Line".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id;

    registry.add_point(id, point_at(0.0, 0.0)).await.unwrap();
    registry.add_point(id, point_at(0.0, 20.0)).await.unwrap();
    let result = registry.finalize(id, &service).await;
    assert!(matches!(
        result,
        Err(AppError::IncompleteBoundary {
            found: 2,
            required: 3
        })
    ));

    registry.add_point(id, point_at(0.0, 40.0)).await.unwrap();
    let result = registry.finalize(id, &service).await;
    assert!(matches!(result, Err(AppError::DegenerateGeometry)));

    // Still open with every point
    let view = registry.snapshot(id).await.unwrap();
    assert_eq!(view.snapshot.points.len(), 3);
    assert!(service.list_fields().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_save_keeps_session() {
    let repository = Arc::new(FlakyRepository::default());
    let service = field_service_with(
        repository.clone(),
        Arc::new(CountingProvider::new(indices(0.6, 0.0))),
    );
    let registry = CaptureRegistry::new(5.0);
    let id = registry
        .open(OpenSessionInput {
            name: "Offline save".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id;
    for (north, east) in [(0.0, 0.0), (0.0, 50.0), (50.0, 50.0), (50.0, 0.0)] {
        registry.add_point(id, point_at(north, east)).await.unwrap();
    }

    repository.set_failing(true);
    let result = registry.finalize(id, &service).await;
    assert!(matches!(result, Err(AppError::PersistenceError(_))));
    assert_eq!(registry.open_sessions().await, 1);
    assert_eq!(registry.snapshot(id).await.unwrap().snapshot.points.len(), 4);

    repository.set_failing(false);
    let field = registry.finalize(id, &service).await.unwrap();
    assert!((field.area_hectares.unwrap() - 0.25).abs() < 0.003);
    assert_eq!(registry.open_sessions().await, 0);
}

#[tokio::test]
async fn test_repeated_finalize_creates_one_field() {
    let repository = Arc::new(FlakyRepository::default());
    repository.set_insert_delay(Duration::from_millis(150));
    let service = field_service_with(
        repository.clone(),
        Arc::new(CountingProvider::new(indices(0.6, 0.0))),
    );
    let registry = CaptureRegistry::new(5.0);
    let id = registry
        .open(OpenSessionInput {
            name: "Double tap".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        .id;
    for (north, east) in [(0.0, 0.0), (0.0, 30.0), (30.0, 30.0)] {
        registry.add_point(id, point_at(north, east)).await.unwrap();
    }

    let (first, second) = tokio::join!(registry.finalize(id, &service), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        registry.finalize(id, &service).await
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::NotFound(_))));
    assert_eq!(service.list_fields().await.unwrap().len(), 1);
    assert_eq!(registry.open_sessions().await, 0);
    assert!(matches!(
        registry.add_point(id, point_at(10.0, 0.0)).await,
        Err(AppError::NotFound(_))
    ));
}
