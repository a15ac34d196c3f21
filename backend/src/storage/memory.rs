//! In-memory repository, used when no database URL is configured and in tests

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{AnalysisRecord, AnalysisStatus, BoundaryRevision, Field, FieldState, Recommendation};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{FieldRepository, StorageError, StorageResult};

#[derive(Default)]
struct MemoryState {
    fields: HashMap<Uuid, Field>,
    revisions: Vec<BoundaryRevision>,
    analyses: Vec<AnalysisRecord>,
    recommendations: Vec<Recommendation>,
}

/// Repository holding everything in process memory
#[derive(Default)]
pub struct InMemoryFieldRepository {
    state: RwLock<MemoryState>,
}

impl InMemoryFieldRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FieldRepository for InMemoryFieldRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn insert_field(&self, field: &Field) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if state.fields.contains_key(&field.id) {
            return Err(StorageError::Duplicate(format!("field {}", field.id)));
        }
        state.fields.insert(field.id, field.clone());
        Ok(())
    }

    async fn get_field(&self, id: Uuid) -> StorageResult<Option<Field>> {
        Ok(self.state.read().await.fields.get(&id).cloned())
    }

    async fn list_fields(&self) -> StorageResult<Vec<Field>> {
        let state = self.state.read().await;
        let mut fields: Vec<Field> = state.fields.values().cloned().collect();
        fields.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
        Ok(fields)
    }

    async fn update_boundary(
        &self,
        field: &Field,
        replaced: Option<&BoundaryRevision>,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .fields
            .get_mut(&field.id)
            .ok_or(StorageError::NotFound {
                entity: "field",
                id: field.id,
            })?;
        stored.boundary = field.boundary.clone();
        stored.area_hectares = field.area_hectares;
        stored.state = field.state;
        stored.updated_at = field.updated_at;
        if let Some(revision) = replaced {
            state.revisions.push(revision.clone());
        }
        Ok(())
    }

    async fn list_boundary_revisions(&self, field_id: Uuid) -> StorageResult<Vec<BoundaryRevision>> {
        let state = self.state.read().await;
        Ok(state
            .revisions
            .iter()
            .filter(|r| r.field_id == field_id)
            .cloned()
            .collect())
    }

    async fn insert_analysis(&self, record: &AnalysisRecord) -> StorageResult<()> {
        let mut state = self.state.write().await;
        if !state.fields.contains_key(&record.field_id) {
            return Err(StorageError::NotFound {
                entity: "field",
                id: record.field_id,
            });
        }
        state.analyses.push(record.clone());
        Ok(())
    }

    async fn resolve_analysis(
        &self,
        record: &AnalysisRecord,
        recommendations: &[Recommendation],
        field_state: FieldState,
    ) -> StorageResult<()> {
        let mut state = self.state.write().await;

        let index = state
            .analyses
            .iter()
            .position(|a| a.id == record.id)
            .ok_or(StorageError::NotFound {
                entity: "analysis",
                id: record.id,
            })?;
        if state.analyses[index].status != AnalysisStatus::Pending {
            return Err(StorageError::AlreadyResolved(record.id));
        }
        if !state.fields.contains_key(&record.field_id) {
            return Err(StorageError::NotFound {
                entity: "field",
                id: record.field_id,
            });
        }

        state.analyses[index] = record.clone();
        state.recommendations.extend(recommendations.iter().cloned());
        if let Some(field) = state.fields.get_mut(&record.field_id) {
            if field.state != field_state {
                field.state = field_state;
                field.updated_at = record.resolved_at.unwrap_or(field.updated_at);
            }
        }
        Ok(())
    }

    async fn find_completed_analysis(
        &self,
        field_id: Uuid,
        analysis_date: NaiveDate,
        request_fingerprint: &str,
    ) -> StorageResult<Option<AnalysisRecord>> {
        let state = self.state.read().await;
        Ok(state
            .analyses
            .iter()
            .find(|a| {
                a.field_id == field_id
                    && a.analysis_date == analysis_date
                    && a.request_fingerprint == request_fingerprint
                    && a.is_completed()
            })
            .cloned())
    }

    async fn list_analyses(&self, field_id: Uuid) -> StorageResult<Vec<AnalysisRecord>> {
        let state = self.state.read().await;
        let mut analyses: Vec<AnalysisRecord> = state
            .analyses
            .iter()
            .filter(|a| a.field_id == field_id)
            .cloned()
            .collect();
        analyses.sort_by(|a, b| {
            a.analysis_date
                .cmp(&b.analysis_date)
                .then(a.requested_at.cmp(&b.requested_at))
        });
        Ok(analyses)
    }

    async fn list_recommendations(&self, field_id: Uuid) -> StorageResult<Vec<Recommendation>> {
        let state = self.state.read().await;
        Ok(state
            .recommendations
            .iter()
            .filter(|r| r.field_id == field_id)
            .cloned()
            .collect())
    }

    async fn get_recommendation(&self, id: Uuid) -> StorageResult<Option<Recommendation>> {
        let state = self.state.read().await;
        Ok(state.recommendations.iter().find(|r| r.id == id).cloned())
    }

    async fn update_recommendation_status(&self, recommendation: &Recommendation) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .recommendations
            .iter_mut()
            .find(|r| r.id == recommendation.id)
            .ok_or(StorageError::NotFound {
                entity: "recommendation",
                id: recommendation.id,
            })?;
        stored.implemented = recommendation.implemented;
        stored.farmer_feedback = recommendation.farmer_feedback.clone();
        stored.implemented_at = recommendation.implemented_at;
        Ok(())
    }
}
