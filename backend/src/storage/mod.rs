//! Persistence for fields, analyses and recommendations
//!
//! Repositories only create, append and apply the narrow updates the field
//! lifecycle allows. Nothing here decides state transitions; the
//! [`FieldService`](crate::services::FieldService) does.

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{AnalysisRecord, BoundaryRevision, Field, FieldState, Recommendation};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryFieldRepository;
pub use postgres::PgFieldRepository;

/// Storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("analysis {0} is not pending")]
    AlreadyResolved(Uuid),

    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence boundary for the field lifecycle
#[async_trait]
pub trait FieldRepository: Send + Sync {
    /// Short name reported by the health endpoint
    fn backend_name(&self) -> &'static str;

    async fn health(&self) -> StorageResult<()>;

    async fn insert_field(&self, field: &Field) -> StorageResult<()>;

    async fn get_field(&self, id: Uuid) -> StorageResult<Option<Field>>;

    async fn list_fields(&self) -> StorageResult<Vec<Field>>;

    /// Store a field's new boundary, area and state together with the revision it replaced
    async fn update_boundary(
        &self,
        field: &Field,
        replaced: Option<&BoundaryRevision>,
    ) -> StorageResult<()>;

    async fn list_boundary_revisions(&self, field_id: Uuid) -> StorageResult<Vec<BoundaryRevision>>;

    /// Append a pending analysis record
    async fn insert_analysis(&self, record: &AnalysisRecord) -> StorageResult<()>;

    /// Resolve a pending record, append its recommendations and set the field state in one write
    ///
    /// Fails with [`StorageError::AlreadyResolved`] when the stored record is
    /// no longer pending.
    async fn resolve_analysis(
        &self,
        record: &AnalysisRecord,
        recommendations: &[Recommendation],
        field_state: FieldState,
    ) -> StorageResult<()>;

    /// Completed analysis for the same field, date and request fingerprint
    async fn find_completed_analysis(
        &self,
        field_id: Uuid,
        analysis_date: NaiveDate,
        request_fingerprint: &str,
    ) -> StorageResult<Option<AnalysisRecord>>;

    /// Time series ordered by analysis date, then request time
    async fn list_analyses(&self, field_id: Uuid) -> StorageResult<Vec<AnalysisRecord>>;

    async fn list_recommendations(&self, field_id: Uuid) -> StorageResult<Vec<Recommendation>>;

    async fn get_recommendation(&self, id: Uuid) -> StorageResult<Option<Recommendation>>;

    /// Persist the implementation flag, feedback and timestamp of a recommendation
    async fn update_recommendation_status(&self, recommendation: &Recommendation) -> StorageResult<()>;
}
