//! PostgreSQL repository

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    AnalysisRecord, BoundaryRevision, CropType, Field, FieldBoundary, FieldState, GeoPoint,
    IndexClassification, Recommendation,
};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{FieldRepository, StorageError, StorageResult};

/// Repository backed by PostgreSQL
#[derive(Clone)]
pub struct PgFieldRepository {
    db: PgPool,
}

impl PgFieldRepository {
    /// Create a new PgFieldRepository instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FieldRow {
    id: Uuid,
    name: String,
    crop_type: Option<String>,
    notes: Option<String>,
    boundary: Option<Json<Vec<GeoPoint>>>,
    area_hectares: Option<f64>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct RevisionRow {
    id: Uuid,
    field_id: Uuid,
    boundary: Json<Vec<GeoPoint>>,
    area_hectares: f64,
    replaced_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct AnalysisRow {
    id: Uuid,
    field_id: Uuid,
    analysis_date: NaiveDate,
    crop_type: String,
    status: String,
    classification: Option<Json<IndexClassification>>,
    failure_reason: Option<String>,
    request_fingerprint: String,
    requested_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct RecommendationRow {
    id: Uuid,
    field_id: Uuid,
    analysis_id: Uuid,
    title: String,
    description: String,
    priority: String,
    category: String,
    action_items: Json<Vec<String>>,
    estimated_cost: Decimal,
    timeline: String,
    implemented: bool,
    farmer_feedback: Option<String>,
    implemented_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn corrupt(e: impl ToString) -> StorageError {
    StorageError::Corrupt(e.to_string())
}

fn parse_crop(value: &str) -> StorageResult<CropType> {
    value.parse().map_err(corrupt)
}

impl TryFrom<FieldRow> for Field {
    type Error = StorageError;

    fn try_from(row: FieldRow) -> Result<Self, Self::Error> {
        let boundary = row
            .boundary
            .map(|Json(points)| FieldBoundary::new(points))
            .transpose()
            .map_err(corrupt)?;
        Ok(Field {
            id: row.id,
            name: row.name,
            crop_type: row.crop_type.as_deref().map(parse_crop).transpose()?,
            notes: row.notes,
            boundary,
            area_hectares: row.area_hectares,
            state: row.state.parse().map_err(corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<RevisionRow> for BoundaryRevision {
    type Error = StorageError;

    fn try_from(row: RevisionRow) -> Result<Self, Self::Error> {
        Ok(BoundaryRevision {
            id: row.id,
            field_id: row.field_id,
            boundary: FieldBoundary::new(row.boundary.0).map_err(corrupt)?,
            area_hectares: row.area_hectares,
            replaced_at: row.replaced_at,
        })
    }
}

impl TryFrom<AnalysisRow> for AnalysisRecord {
    type Error = StorageError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        Ok(AnalysisRecord {
            id: row.id,
            field_id: row.field_id,
            analysis_date: row.analysis_date,
            crop_type: parse_crop(&row.crop_type)?,
            status: row.status.parse().map_err(corrupt)?,
            classification: row.classification.map(|Json(c)| c),
            failure_reason: row.failure_reason,
            request_fingerprint: row.request_fingerprint,
            requested_at: row.requested_at,
            resolved_at: row.resolved_at,
        })
    }
}

impl TryFrom<RecommendationRow> for Recommendation {
    type Error = StorageError;

    fn try_from(row: RecommendationRow) -> Result<Self, Self::Error> {
        Ok(Recommendation {
            id: row.id,
            field_id: row.field_id,
            analysis_id: row.analysis_id,
            title: row.title,
            description: row.description,
            priority: row.priority.parse().map_err(corrupt)?,
            category: row.category.parse().map_err(corrupt)?,
            action_items: row.action_items.0,
            estimated_cost: row.estimated_cost,
            timeline: row.timeline,
            implemented: row.implemented,
            farmer_feedback: row.farmer_feedback,
            implemented_at: row.implemented_at,
            created_at: row.created_at,
        })
    }
}

fn boundary_json(field: &Field) -> Option<Json<Vec<GeoPoint>>> {
    field.boundary.as_ref().map(|b| Json(b.points().to_vec()))
}

const FIELD_COLUMNS: &str =
    "id, name, crop_type, notes, boundary, area_hectares, state, created_at, updated_at";

const ANALYSIS_COLUMNS: &str = "id, field_id, analysis_date, crop_type, status, classification, \
     failure_reason, request_fingerprint, requested_at, resolved_at";

const RECOMMENDATION_COLUMNS: &str = "id, field_id, analysis_id, title, description, priority, \
     category, action_items, estimated_cost, timeline, implemented, farmer_feedback, \
     implemented_at, created_at";

#[async_trait]
impl FieldRepository for PgFieldRepository {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn health(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn insert_field(&self, field: &Field) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fields (id, name, crop_type, notes, boundary, area_hectares, state,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(field.id)
        .bind(&field.name)
        .bind(field.crop_type.map(|c| c.as_str()))
        .bind(&field.notes)
        .bind(boundary_json(field))
        .bind(field.area_hectares)
        .bind(field.state.as_str())
        .bind(field.created_at)
        .bind(field.updated_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn get_field(&self, id: Uuid) -> StorageResult<Option<Field>> {
        let row = sqlx::query_as::<_, FieldRow>(&format!(
            "SELECT {} FROM fields WHERE id = $1",
            FIELD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Field::try_from).transpose()
    }

    async fn list_fields(&self) -> StorageResult<Vec<Field>> {
        let rows = sqlx::query_as::<_, FieldRow>(&format!(
            "SELECT {} FROM fields ORDER BY created_at DESC, name ASC",
            FIELD_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Field::try_from).collect()
    }

    async fn update_boundary(
        &self,
        field: &Field,
        replaced: Option<&BoundaryRevision>,
    ) -> StorageResult<()> {
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE fields
            SET boundary = $2, area_hectares = $3, state = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(field.id)
        .bind(boundary_json(field))
        .bind(field.area_hectares)
        .bind(field.state.as_str())
        .bind(field.updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "field",
                id: field.id,
            });
        }

        if let Some(revision) = replaced {
            sqlx::query(
                r#"
                INSERT INTO boundary_revisions (id, field_id, boundary, area_hectares, replaced_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(revision.id)
            .bind(revision.field_id)
            .bind(Json(revision.boundary.points().to_vec()))
            .bind(revision.area_hectares)
            .bind(revision.replaced_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_boundary_revisions(&self, field_id: Uuid) -> StorageResult<Vec<BoundaryRevision>> {
        let rows = sqlx::query_as::<_, RevisionRow>(
            r#"
            SELECT id, field_id, boundary, area_hectares, replaced_at
            FROM boundary_revisions
            WHERE field_id = $1
            ORDER BY replaced_at ASC
            "#,
        )
        .bind(field_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(BoundaryRevision::try_from).collect()
    }

    async fn insert_analysis(&self, record: &AnalysisRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO analyses (id, field_id, analysis_date, crop_type, status, classification,
                                  failure_reason, request_fingerprint, requested_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id)
        .bind(record.field_id)
        .bind(record.analysis_date)
        .bind(record.crop_type.as_str())
        .bind(record.status.as_str())
        .bind(record.classification.map(Json))
        .bind(&record.failure_reason)
        .bind(&record.request_fingerprint)
        .bind(record.requested_at)
        .bind(record.resolved_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn resolve_analysis(
        &self,
        record: &AnalysisRecord,
        recommendations: &[Recommendation],
        field_state: FieldState,
    ) -> StorageResult<()> {
        let mut tx = self.db.begin().await?;

        // Only a pending row can be resolved
        let updated = sqlx::query(
            r#"
            UPDATE analyses
            SET status = $2, classification = $3, failure_reason = $4, resolved_at = $5
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(record.classification.map(Json))
        .bind(&record.failure_reason)
        .bind(record.resolved_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StorageError::AlreadyResolved(record.id));
        }

        for (rule_order, recommendation) in recommendations.iter().enumerate() {
            sqlx::query(&format!(
                "INSERT INTO recommendations ({}, rule_order) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
                RECOMMENDATION_COLUMNS
            ))
            .bind(recommendation.id)
            .bind(recommendation.field_id)
            .bind(recommendation.analysis_id)
            .bind(&recommendation.title)
            .bind(&recommendation.description)
            .bind(recommendation.priority.as_str())
            .bind(recommendation.category.as_str())
            .bind(Json(&recommendation.action_items))
            .bind(recommendation.estimated_cost)
            .bind(&recommendation.timeline)
            .bind(recommendation.implemented)
            .bind(&recommendation.farmer_feedback)
            .bind(recommendation.implemented_at)
            .bind(recommendation.created_at)
            .bind(rule_order as i16)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            UPDATE fields
            SET state = $2, updated_at = COALESCE($3, updated_at)
            WHERE id = $1 AND state <> $2
            "#,
        )
        .bind(record.field_id)
        .bind(field_state.as_str())
        .bind(record.resolved_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_completed_analysis(
        &self,
        field_id: Uuid,
        analysis_date: NaiveDate,
        request_fingerprint: &str,
    ) -> StorageResult<Option<AnalysisRecord>> {
        let row = sqlx::query_as::<_, AnalysisRow>(&format!(
            "SELECT {} FROM analyses \
             WHERE field_id = $1 AND analysis_date = $2 AND request_fingerprint = $3 \
               AND status = 'completed' \
             LIMIT 1",
            ANALYSIS_COLUMNS
        ))
        .bind(field_id)
        .bind(analysis_date)
        .bind(request_fingerprint)
        .fetch_optional(&self.db)
        .await?;

        row.map(AnalysisRecord::try_from).transpose()
    }

    async fn list_analyses(&self, field_id: Uuid) -> StorageResult<Vec<AnalysisRecord>> {
        let rows = sqlx::query_as::<_, AnalysisRow>(&format!(
            "SELECT {} FROM analyses WHERE field_id = $1 ORDER BY analysis_date ASC, requested_at ASC",
            ANALYSIS_COLUMNS
        ))
        .bind(field_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(AnalysisRecord::try_from).collect()
    }

    async fn list_recommendations(&self, field_id: Uuid) -> StorageResult<Vec<Recommendation>> {
        let rows = sqlx::query_as::<_, RecommendationRow>(&format!(
            "SELECT {} FROM recommendations WHERE field_id = $1 \
             ORDER BY created_at ASC, rule_order ASC",
            RECOMMENDATION_COLUMNS
        ))
        .bind(field_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Recommendation::try_from).collect()
    }

    async fn get_recommendation(&self, id: Uuid) -> StorageResult<Option<Recommendation>> {
        let row = sqlx::query_as::<_, RecommendationRow>(&format!(
            "SELECT {} FROM recommendations WHERE id = $1",
            RECOMMENDATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        row.map(Recommendation::try_from).transpose()
    }

    async fn update_recommendation_status(&self, recommendation: &Recommendation) -> StorageResult<()> {
        let updated = sqlx::query(
            r#"
            UPDATE recommendations
            SET implemented = $2, farmer_feedback = $3, implemented_at = $4
            WHERE id = $1
            "#,
        )
        .bind(recommendation.id)
        .bind(recommendation.implemented)
        .bind(&recommendation.farmer_feedback)
        .bind(recommendation.implemented_at)
        .execute(&self.db)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "recommendation",
                id: recommendation.id,
            });
        }
        Ok(())
    }
}
