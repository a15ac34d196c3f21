//! Analysis pipeline: provider call, classification and recommendations
//!
//! The pipeline holds no field state. The [`FieldService`] decides when to
//! run it and persists what it returns.
//!
//! [`FieldService`]: crate::services::FieldService

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use shared::{
    AnalysisRequest, CropType, IndexClassification, RecommendationDraft, RecommendationEngine,
    VegetationIndexAnalyzer,
};
use uuid::Uuid;

use crate::external::{IndexRequest, ProviderError, VegetationIndexProvider};

/// Runs one analysis request against the configured provider
pub struct AnalysisPipeline {
    analyzer: VegetationIndexAnalyzer,
    engine: RecommendationEngine,
    provider: Arc<dyn VegetationIndexProvider>,
    timeout: Duration,
}

impl AnalysisPipeline {
    pub fn new(
        analyzer: VegetationIndexAnalyzer,
        engine: RecommendationEngine,
        provider: Arc<dyn VegetationIndexProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            analyzer,
            engine,
            provider,
            timeout,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Fetch indices under the provider deadline and classify them
    ///
    /// Payloads the analyzer rejects are reported as provider errors; no
    /// default values are substituted.
    pub async fn classify(
        &self,
        request: &AnalysisRequest,
    ) -> Result<IndexClassification, ProviderError> {
        let index_request = IndexRequest {
            ring: request.boundary.ring(),
            crop_type: request.crop_type,
            date: request.analysis_date,
        };

        let raw = tokio::time::timeout(self.timeout, self.provider.fetch_indices(&index_request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))??;

        self.analyzer
            .classify(request, &raw)
            .map_err(|e| ProviderError::InvalidPayload(e.to_string()))
    }

    pub fn recommend(
        &self,
        classification: &IndexClassification,
        crop_type: CropType,
    ) -> Vec<RecommendationDraft> {
        self.engine.recommend(classification, crop_type)
    }
}

/// Digest of everything that determines an analysis result
///
/// Hex SHA-256 over the field id, the boundary ring, the crop and the date.
pub fn request_fingerprint(field_id: Uuid, request: &AnalysisRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(field_id.as_bytes());
    for point in request.boundary.points() {
        hasher.update(point.latitude.to_le_bytes());
        hasher.update(point.longitude.to_le_bytes());
    }
    hasher.update(request.crop_type.as_str().as_bytes());
    hasher.update(request.analysis_date.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
