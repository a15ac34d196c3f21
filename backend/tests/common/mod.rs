//! Test doubles and fixtures shared by the integration tests

#![allow(dead_code)]

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use field_health_backend::external::{IndexRequest, ProviderError, VegetationIndexProvider};
use field_health_backend::services::{AnalysisPipeline, FieldService};
use field_health_backend::storage::{
    FieldRepository, InMemoryFieldRepository, StorageError, StorageResult,
};
use shared::{
    AnalysisRecord, BoundaryRevision, Field, FieldBoundary, FieldState, GeoPoint, RawIndices,
    Recommendation, RecommendationEngine, VegetationIndexAnalyzer, EARTH_RADIUS_METERS,
};
use uuid::Uuid;

pub const PIPELINE_TIMEOUT: Duration = Duration::from_millis(200);

// ============================================================================
// Geometry fixtures
// ============================================================================

/// Degrees of latitude spanned by `meters`
pub fn meters_to_lat_degrees(meters: f64) -> f64 {
    meters / (EARTH_RADIUS_METERS * PI / 180.0)
}

/// Square of `side_meters` with its south-west corner at `(lat, lon)`
pub fn square_points(lat: f64, lon: f64, side_meters: f64) -> Vec<GeoPoint> {
    let d_lat = meters_to_lat_degrees(side_meters);
    let d_lon = d_lat / lat.to_radians().cos();
    vec![
        GeoPoint::new(lat, lon).unwrap(),
        GeoPoint::new(lat, lon + d_lon).unwrap(),
        GeoPoint::new(lat + d_lat, lon + d_lon).unwrap(),
        GeoPoint::new(lat + d_lat, lon).unwrap(),
    ]
}

pub fn square_boundary(lat: f64, lon: f64, side_meters: f64) -> FieldBoundary {
    FieldBoundary::new(square_points(lat, lon, side_meters)).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn indices(ndvi: f64, cloud_cover_percent: f64) -> RawIndices {
    RawIndices {
        ndvi,
        msavi2: 0.4,
        ndre: 0.3,
        ndmi: 0.15,
        soc_vis: Some(0.2),
        rvi: 2.5,
        cloud_cover_percent,
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Answers with fixed indices and counts calls
pub struct CountingProvider {
    indices: RawIndices,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new(indices: RawIndices) -> Self {
        Self {
            indices,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VegetationIndexProvider for CountingProvider {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn fetch_indices(&self, _request: &IndexRequest) -> Result<RawIndices, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.indices)
    }
}

/// Never answers within the pipeline deadline
pub struct StalledProvider;

#[async_trait]
impl VegetationIndexProvider for StalledProvider {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn fetch_indices(&self, _request: &IndexRequest) -> Result<RawIndices, ProviderError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(ProviderError::Request("unreachable".to_string()))
    }
}

// ============================================================================
// Repositories
// ============================================================================

/// In-memory repository whose writes can be made to fail
#[derive(Default)]
pub struct FlakyRepository {
    inner: InMemoryFieldRepository,
    fail_inserts: AtomicBool,
    fail_completions: AtomicBool,
    fail_resolves: AtomicBool,
    insert_delay_millis: AtomicU64,
}

impl FlakyRepository {
    /// Fail field inserts
    pub fn set_failing(&self, failing: bool) {
        self.fail_inserts.store(failing, Ordering::SeqCst);
    }

    /// Fail storing completed analyses; failed ones still go through
    pub fn set_failing_completions(&self, failing: bool) {
        self.fail_completions.store(failing, Ordering::SeqCst);
    }

    /// Hold every field insert for `delay` before storing it
    pub fn set_insert_delay(&self, delay: Duration) {
        self.insert_delay_millis
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Fail every analysis resolve
    pub fn set_failing_resolves(&self, failing: bool) {
        self.fail_resolves.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl FieldRepository for FlakyRepository {
    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn health(&self) -> StorageResult<()> {
        self.inner.health().await
    }

    async fn insert_field(&self, field: &Field) -> StorageResult<()> {
        let delay = self.insert_delay_millis.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("connection reset".to_string()));
        }
        self.inner.insert_field(field).await
    }

    async fn get_field(&self, id: Uuid) -> StorageResult<Option<Field>> {
        self.inner.get_field(id).await
    }

    async fn list_fields(&self) -> StorageResult<Vec<Field>> {
        self.inner.list_fields().await
    }

    async fn update_boundary(
        &self,
        field: &Field,
        replaced: Option<&BoundaryRevision>,
    ) -> StorageResult<()> {
        self.inner.update_boundary(field, replaced).await
    }

    async fn list_boundary_revisions(&self, field_id: Uuid) -> StorageResult<Vec<BoundaryRevision>> {
        self.inner.list_boundary_revisions(field_id).await
    }

    async fn insert_analysis(&self, record: &AnalysisRecord) -> StorageResult<()> {
        self.inner.insert_analysis(record).await
    }

    async fn resolve_analysis(
        &self,
        record: &AnalysisRecord,
        recommendations: &[Recommendation],
        field_state: FieldState,
    ) -> StorageResult<()> {
        if self.fail_resolves.load(Ordering::SeqCst)
            || (record.is_completed() && self.fail_completions.load(Ordering::SeqCst))
        {
            return Err(StorageError::Unavailable("connection reset".to_string()));
        }
        self.inner
            .resolve_analysis(record, recommendations, field_state)
            .await
    }

    async fn find_completed_analysis(
        &self,
        field_id: Uuid,
        analysis_date: NaiveDate,
        request_fingerprint: &str,
    ) -> StorageResult<Option<AnalysisRecord>> {
        self.inner
            .find_completed_analysis(field_id, analysis_date, request_fingerprint)
            .await
    }

    async fn list_analyses(&self, field_id: Uuid) -> StorageResult<Vec<AnalysisRecord>> {
        self.inner.list_analyses(field_id).await
    }

    async fn list_recommendations(&self, field_id: Uuid) -> StorageResult<Vec<Recommendation>> {
        self.inner.list_recommendations(field_id).await
    }

    async fn get_recommendation(&self, id: Uuid) -> StorageResult<Option<Recommendation>> {
        self.inner.get_recommendation(id).await
    }

    async fn update_recommendation_status(&self, recommendation: &Recommendation) -> StorageResult<()> {
        self.inner.update_recommendation_status(recommendation).await
    }
}

// ============================================================================
// Services
// ============================================================================

pub fn field_service_with(
    repository: Arc<dyn FieldRepository>,
    provider: Arc<dyn VegetationIndexProvider>,
) -> FieldService {
    let pipeline = AnalysisPipeline::new(
        VegetationIndexAnalyzer::default(),
        RecommendationEngine::default(),
        provider,
        PIPELINE_TIMEOUT,
    );
    FieldService::new(repository, Arc::new(pipeline))
}

pub fn field_service(provider: Arc<dyn VegetationIndexProvider>) -> FieldService {
    field_service_with(Arc::new(InMemoryFieldRepository::new()), provider)
}
