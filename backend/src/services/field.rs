//! Field lifecycle service
//!
//! The only writer of persisted field state. Owns the
//! `unmapped → mapped → analyzed` transitions, keeps boundary history on
//! remap and makes analysis requests idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    validate_field_name, AnalysisRecord, AnalysisRequest, AnalysisStatus, BoundaryRevision,
    CropType, Field, FieldBoundary, FieldMetadata, FieldState, PolygonGeometry, Recommendation,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::analysis::{request_fingerprint, AnalysisPipeline};
use crate::storage::FieldRepository;

/// Field service for the field lifecycle
#[derive(Clone)]
pub struct FieldService {
    repository: Arc<dyn FieldRepository>,
    pipeline: Arc<AnalysisPipeline>,
    analysis_locks: Arc<FieldLocks>,
}

/// Per-field mutexes serializing analysis requests and remaps
#[derive(Default)]
struct FieldLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl FieldLocks {
    async fn acquire(&self, field_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(field_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Input for creating a field
#[derive(Debug, Deserialize)]
pub struct CreateFieldInput {
    pub name: String,
    pub crop_type: Option<CropType>,
    pub notes: Option<String>,
    /// Omitted for a draft field that is mapped later
    pub boundary: Option<PolygonGeometry>,
}

/// Input for replacing a field boundary
#[derive(Debug, Deserialize)]
pub struct RemapFieldInput {
    pub boundary: PolygonGeometry,
}

/// Input for requesting an analysis
#[derive(Debug, Default, Deserialize)]
pub struct RequestAnalysisInput {
    /// Defaults to the field's current boundary
    pub boundary: Option<PolygonGeometry>,
    /// Defaults to the field's crop
    pub crop_type: Option<CropType>,
    /// Defaults to today (UTC)
    pub analysis_date: Option<NaiveDate>,
}

/// Input for marking a recommendation implemented
#[derive(Debug, Default, Deserialize)]
pub struct MarkImplementedInput {
    pub feedback: Option<String>,
}

/// Field with its perimeter and latest completed analysis
#[derive(Debug, Clone, Serialize)]
pub struct FieldDetail {
    #[serde(flatten)]
    pub field: Field,
    pub perimeter_meters: Option<f64>,
    pub latest_analysis: Option<AnalysisRecord>,
}

/// Result of an analysis request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Completed {
        analysis: AnalysisRecord,
        recommendations: Vec<Recommendation>,
        /// True when an earlier identical request was returned
        reused: bool,
    },
    Failed { analysis: AnalysisRecord },
}

impl AnalysisOutcome {
    pub fn analysis(&self) -> &AnalysisRecord {
        match self {
            AnalysisOutcome::Completed { analysis, .. } => analysis,
            AnalysisOutcome::Failed { analysis } => analysis,
        }
    }
}

fn boundary_from_geometry(geometry: PolygonGeometry) -> AppResult<FieldBoundary> {
    Ok(FieldBoundary::try_from(geometry)?)
}

impl FieldService {
    /// Create a new FieldService instance
    pub fn new(repository: Arc<dyn FieldRepository>, pipeline: Arc<AnalysisPipeline>) -> Self {
        Self {
            repository,
            pipeline,
            analysis_locks: Arc::new(FieldLocks::default()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn FieldRepository> {
        &self.repository
    }

    pub fn provider_name(&self) -> &'static str {
        self.pipeline.provider_name()
    }

    /// Create a field from API input
    pub async fn create_field(&self, input: CreateFieldInput) -> AppResult<Field> {
        let boundary = input.boundary.map(boundary_from_geometry).transpose()?;
        let metadata = FieldMetadata {
            name: input.name,
            crop_type: input.crop_type,
            notes: input.notes,
        };
        self.create_field_with_boundary(metadata, boundary).await
    }

    /// Create a field; mapped when a validated boundary is given, a draft otherwise
    pub async fn create_field_with_boundary(
        &self,
        metadata: FieldMetadata,
        boundary: Option<FieldBoundary>,
    ) -> AppResult<Field> {
        validate_field_name(&metadata.name)
            .map_err(|e| AppError::validation("name", e, "खेत का नाम मान्य नहीं है"))?;

        let field = Field::new(metadata, boundary, Utc::now());
        self.repository.insert_field(&field).await?;

        tracing::info!(
            field_id = %field.id,
            state = %field.state,
            area_hectares = ?field.area_hectares,
            "Field created"
        );
        Ok(field)
    }

    pub async fn get_field(&self, field_id: Uuid) -> AppResult<Field> {
        self.repository
            .get_field(field_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Field {}", field_id)))
    }

    /// Field with perimeter and its most recent analysis
    pub async fn get_field_detail(&self, field_id: Uuid) -> AppResult<FieldDetail> {
        let field = self.get_field(field_id).await?;
        let latest_analysis = self.latest_analysis(field_id).await?;
        Ok(FieldDetail {
            perimeter_meters: field.boundary.as_ref().map(FieldBoundary::perimeter_meters),
            field,
            latest_analysis,
        })
    }

    pub async fn list_fields(&self) -> AppResult<Vec<Field>> {
        Ok(self.repository.list_fields().await?)
    }

    /// Replace the boundary of an existing field
    ///
    /// The previous boundary is kept as a revision; analyses and state are
    /// untouched.
    pub async fn remap_field(&self, field_id: Uuid, input: RemapFieldInput) -> AppResult<Field> {
        let boundary = boundary_from_geometry(input.boundary)?;
        self.remap_field_with_boundary(field_id, boundary).await
    }

    pub async fn remap_field_with_boundary(
        &self,
        field_id: Uuid,
        boundary: FieldBoundary,
    ) -> AppResult<Field> {
        let _guard = self.analysis_locks.acquire(field_id).await;

        let mut field = self.get_field(field_id).await?;
        let now = Utc::now();
        let previous = field.replace_boundary(boundary, now);
        let revision = previous.map(|b| BoundaryRevision::new(field.id, b, now));

        self.repository
            .update_boundary(&field, revision.as_ref())
            .await?;

        tracing::info!(
            field_id = %field.id,
            state = %field.state,
            area_hectares = ?field.area_hectares,
            "Field boundary updated"
        );
        Ok(field)
    }

    pub async fn list_boundary_revisions(&self, field_id: Uuid) -> AppResult<Vec<BoundaryRevision>> {
        self.get_field(field_id).await?;
        Ok(self.repository.list_boundary_revisions(field_id).await?)
    }

    /// Analyze a field and derive recommendations
    ///
    /// Requests for the same field run one at a time. A request identical
    /// to an already completed one (same boundary, crop and date) returns
    /// the stored result without calling the provider. Provider failures
    /// are stored as failed records and returned as
    /// [`AnalysisOutcome::Failed`]; the field state is left as it was.
    pub async fn request_analysis(
        &self,
        field_id: Uuid,
        input: RequestAnalysisInput,
    ) -> AppResult<AnalysisOutcome> {
        let _guard = self.analysis_locks.acquire(field_id).await;

        let field = self.get_field(field_id).await?;
        if !field.state.can_analyze() {
            return Err(AppError::InvalidStateTransition(format!(
                "Field {} has no boundary yet",
                field_id
            )));
        }

        let boundary = match input.boundary {
            Some(geometry) => boundary_from_geometry(geometry)?,
            None => field.boundary.clone().ok_or_else(|| {
                AppError::InvalidStateTransition(format!("Field {} has no boundary yet", field_id))
            })?,
        };
        let crop_type = input.crop_type.or(field.crop_type).ok_or_else(|| {
            AppError::validation(
                "crop_type",
                "Crop type is required when the field has none",
                "फसल का प्रकार आवश्यक है",
            )
        })?;
        let request = AnalysisRequest {
            boundary,
            crop_type,
            analysis_date: input.analysis_date.unwrap_or_else(|| Utc::now().date_naive()),
        };

        let fingerprint = request_fingerprint(field_id, &request);
        if let Some(existing) = self
            .repository
            .find_completed_analysis(field_id, request.analysis_date, &fingerprint)
            .await?
        {
            tracing::debug!(
                field_id = %field_id,
                analysis_id = %existing.id,
                "Returning completed analysis for identical request"
            );
            let recommendations = self
                .repository
                .list_recommendations(field_id)
                .await?
                .into_iter()
                .filter(|r| r.analysis_id == existing.id)
                .collect();
            return Ok(AnalysisOutcome::Completed {
                analysis: existing,
                recommendations,
                reused: true,
            });
        }

        self.fail_interrupted(&field).await?;

        let mut record = AnalysisRecord::pending(field_id, &request, fingerprint, Utc::now());
        self.repository.insert_analysis(&record).await?;

        tracing::info!(
            field_id = %field_id,
            analysis_id = %record.id,
            crop_type = %request.crop_type,
            analysis_date = %request.analysis_date,
            provider = self.pipeline.provider_name(),
            "Analysis requested"
        );

        match self.pipeline.classify(&request).await {
            Ok(classification) => {
                let now = Utc::now();
                let next_state = field.state.on_analysis_completed()?;
                let pending = record.clone();
                record
                    .complete(classification, now)
                    .map_err(|e| AppError::Internal(e.to_string()))?;

                let recommendations: Vec<Recommendation> = self
                    .pipeline
                    .recommend(&classification, request.crop_type)
                    .into_iter()
                    .map(|draft| Recommendation::from_draft(field_id, record.id, draft, now))
                    .collect();

                if let Err(e) = self
                    .repository
                    .resolve_analysis(&record, &recommendations, next_state)
                    .await
                {
                    tracing::error!(
                        field_id = %field_id,
                        analysis_id = %record.id,
                        error = %e,
                        "Could not store analysis result"
                    );
                    let reason = format!("result could not be stored: {}", e);
                    self.store_failure(pending, reason, field.state).await;
                    return Err(e.into());
                }

                tracing::info!(
                    field_id = %field_id,
                    analysis_id = %record.id,
                    health = %classification.health_status,
                    water_stress = %classification.water_stress_level,
                    recommendations = recommendations.len(),
                    "Analysis completed"
                );
                Ok(AnalysisOutcome::Completed {
                    analysis: record,
                    recommendations,
                    reused: false,
                })
            }
            Err(provider_error) => {
                tracing::warn!(
                    field_id = %field_id,
                    analysis_id = %record.id,
                    error = %provider_error,
                    "Analysis failed"
                );
                record
                    .fail(provider_error.to_string(), Utc::now())
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                self.repository
                    .resolve_analysis(&record, &[], field.state)
                    .await?;
                Ok(AnalysisOutcome::Failed { analysis: record })
            }
        }
    }

    /// Resolve a pending record as failed, logging when even that is refused
    ///
    /// A record this leaves pending is failed by the next request for the
    /// field.
    async fn store_failure(&self, mut record: AnalysisRecord, reason: String, state: FieldState) {
        if record.fail(reason, Utc::now()).is_err() {
            return;
        }
        if let Err(e) = self.repository.resolve_analysis(&record, &[], state).await {
            tracing::error!(
                field_id = %record.field_id,
                analysis_id = %record.id,
                error = %e,
                "Analysis left pending"
            );
        }
    }

    /// Fail records left pending by an earlier request whose result never
    /// reached storage
    ///
    /// Callers hold the field's analysis lock, so no request is in flight.
    async fn fail_interrupted(&self, field: &Field) -> AppResult<()> {
        let interrupted = self
            .repository
            .list_analyses(field.id)
            .await?
            .into_iter()
            .filter(|a| a.status == AnalysisStatus::Pending);
        for mut record in interrupted {
            record
                .fail("interrupted before the result was stored", Utc::now())
                .map_err(|e| AppError::Internal(e.to_string()))?;
            self.repository
                .resolve_analysis(&record, &[], field.state)
                .await?;
            tracing::warn!(
                field_id = %field.id,
                analysis_id = %record.id,
                "Interrupted analysis marked failed"
            );
        }
        Ok(())
    }

    /// Run [`request_analysis`](Self::request_analysis) in the background
    pub fn spawn_analysis(
        &self,
        field_id: Uuid,
        input: RequestAnalysisInput,
    ) -> JoinHandle<AppResult<AnalysisOutcome>> {
        let service = self.clone();
        tokio::spawn(async move { service.request_analysis(field_id, input).await })
    }

    /// Analysis time series of a field, oldest first
    pub async fn list_analyses(&self, field_id: Uuid) -> AppResult<Vec<AnalysisRecord>> {
        self.get_field(field_id).await?;
        Ok(self.repository.list_analyses(field_id).await?)
    }

    /// Most recent completed analysis
    pub async fn latest_analysis(&self, field_id: Uuid) -> AppResult<Option<AnalysisRecord>> {
        let analyses = self.repository.list_analyses(field_id).await?;
        Ok(analyses.into_iter().rev().find(AnalysisRecord::is_completed))
    }

    pub async fn list_recommendations(&self, field_id: Uuid) -> AppResult<Vec<Recommendation>> {
        self.get_field(field_id).await?;
        Ok(self.repository.list_recommendations(field_id).await?)
    }

    /// Record that a farmer acted on a recommendation
    pub async fn mark_implemented(
        &self,
        recommendation_id: Uuid,
        input: MarkImplementedInput,
    ) -> AppResult<Recommendation> {
        let mut recommendation = self
            .repository
            .get_recommendation(recommendation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Recommendation {}", recommendation_id)))?;

        recommendation.mark_implemented(input.feedback, Utc::now());
        self.repository
            .update_recommendation_status(&recommendation)
            .await?;

        tracing::info!(
            recommendation_id = %recommendation.id,
            field_id = %recommendation.field_id,
            "Recommendation marked implemented"
        );
        Ok(recommendation)
    }
}
