//! Vegetation Index Provider
//!
//! Satellite imagery services return index values for a polygon on a date.
//! The analyzer only sees the [`VegetationIndexProvider`] trait, so the
//! remote service can be swapped for a deterministic provider offline and
//! in tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::{CropType, PolygonGeometry, RawIndices};
use thiserror::Error;

/// What a provider is asked for
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexRequest {
    /// Open ring of `[longitude, latitude]` pairs
    pub ring: Vec<[f64; 2]>,
    pub crop_type: CropType,
    pub date: NaiveDate,
}

/// Provider failures; none of them produce indices
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid provider payload: {0}")]
    InvalidPayload(String),
}

/// Source of raw vegetation indices for a polygon
#[async_trait]
pub trait VegetationIndexProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_indices(&self, request: &IndexRequest) -> Result<RawIndices, ProviderError>;
}

// ============================================================================
// HTTP provider
// ============================================================================

/// Client for a remote satellite index API
#[derive(Clone)]
pub struct HttpIndexProvider {
    api_endpoint: String,
    api_key: Option<String>,
    http_client: Client,
}

/// Request body sent to the index API
#[derive(Debug, Serialize)]
struct AnalyzeIndicesRequest {
    geometry: PolygonGeometry,
    crop_type: CropType,
    date: NaiveDate,
}

impl From<&IndexRequest> for AnalyzeIndicesRequest {
    fn from(request: &IndexRequest) -> Self {
        Self {
            geometry: PolygonGeometry::from_open_ring(request.ring.clone()),
            crop_type: request.crop_type,
            date: request.date,
        }
    }
}

/// Response from the index API
#[derive(Debug, Deserialize)]
struct AnalyzeIndicesResponse {
    indices: IndexValues,
    cloud_cover: f64,
}

#[derive(Debug, Deserialize)]
struct IndexValues {
    ndvi: f64,
    msavi2: f64,
    ndre: f64,
    ndmi: f64,
    #[serde(default)]
    soc_vis: Option<f64>,
    rvi: f64,
}

impl From<AnalyzeIndicesResponse> for RawIndices {
    fn from(r: AnalyzeIndicesResponse) -> Self {
        RawIndices {
            ndvi: r.indices.ndvi,
            msavi2: r.indices.msavi2,
            ndre: r.indices.ndre,
            ndmi: r.indices.ndmi,
            soc_vis: r.indices.soc_vis,
            rvi: r.indices.rvi,
            cloud_cover_percent: r.cloud_cover,
        }
    }
}

impl HttpIndexProvider {
    /// Create a new index API client
    ///
    /// `request_timeout` bounds the HTTP exchange; callers still wrap the
    /// whole call in their own deadline.
    pub fn new(
        api_endpoint: String,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_endpoint,
            api_key,
            http_client,
        })
    }
}

#[async_trait]
impl VegetationIndexProvider for HttpIndexProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_indices(&self, request: &IndexRequest) -> Result<RawIndices, ProviderError> {
        let body = AnalyzeIndicesRequest::from(request);

        let mut builder = self
            .http_client
            .post(&self.api_endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("x-api-key", api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Status { status, body });
        }

        let result: AnalyzeIndicesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidPayload(format!("Failed to parse response: {}", e)))?;

        Ok(result.into())
    }
}

// ============================================================================
// Static provider
// ============================================================================

/// Provider that always answers with the same indices
///
/// Used for offline runs of the pipeline and as a test double.
#[derive(Debug, Clone)]
pub struct StaticIndexProvider {
    indices: RawIndices,
}

impl StaticIndexProvider {
    pub fn new(indices: RawIndices) -> Self {
        Self { indices }
    }
}

impl Default for StaticIndexProvider {
    fn default() -> Self {
        Self::new(RawIndices {
            ndvi: 0.62,
            msavi2: 0.48,
            ndre: 0.31,
            ndmi: 0.22,
            soc_vis: Some(0.18),
            rvi: 3.4,
            cloud_cover_percent: 12.0,
        })
    }
}

#[async_trait]
impl VegetationIndexProvider for StaticIndexProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_indices(&self, _request: &IndexRequest) -> Result<RawIndices, ProviderError> {
        Ok(self.indices)
    }
}
