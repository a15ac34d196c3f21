//! Vegetation index analysis models and classification
//!
//! The analyzer is a pure function of the provider payload, the crop and the
//! analysis date. Identical inputs always produce identical classifications.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AlreadyResolved;
use crate::models::{CropCalendar, CropStage, CropType, FieldBoundary};
use crate::validation::validate_raw_indices;

/// Raw index values returned by an imagery provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RawIndices {
    pub ndvi: f64,
    pub msavi2: f64,
    pub ndre: f64,
    pub ndmi: f64,
    #[serde(default)]
    pub soc_vis: Option<f64>,
    pub rvi: f64,
    pub cloud_cover_percent: f64,
}

/// Index values as stored on an analysis
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VegetationIndices {
    pub ndvi: f64,
    pub msavi2: f64,
    pub ndre: f64,
    pub ndmi: f64,
    /// Only meaningful on bare soil; null once a crop is established
    pub soc_vis: Option<f64>,
    pub rvi: f64,
}

/// Overall vegetation health
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// NDVI above 0.7
    Excellent,
    /// NDVI above 0.5
    Good,
    /// NDVI above 0.3
    Fair,
    Poor,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Excellent => write!(f, "excellent"),
            HealthStatus::Good => write!(f, "good"),
            HealthStatus::Fair => write!(f, "fair"),
            HealthStatus::Poor => write!(f, "poor"),
        }
    }
}

/// Water stress inferred from canopy vigor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WaterStressLevel {
    /// NDVI above 0.6
    None,
    /// NDVI above 0.4
    Mild,
    /// NDVI above 0.2
    Moderate,
    Severe,
}

impl fmt::Display for WaterStressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaterStressLevel::None => write!(f, "none"),
            WaterStressLevel::Mild => write!(f, "mild"),
            WaterStressLevel::Moderate => write!(f, "moderate"),
            WaterStressLevel::Severe => write!(f, "severe"),
        }
    }
}

/// Classify health from NDVI; each band excludes its lower bound
pub fn classify_health(ndvi: f64) -> HealthStatus {
    if ndvi > 0.7 {
        HealthStatus::Excellent
    } else if ndvi > 0.5 {
        HealthStatus::Good
    } else if ndvi > 0.3 {
        HealthStatus::Fair
    } else {
        HealthStatus::Poor
    }
}

/// Classify water stress from NDVI; each band excludes its lower bound
pub fn classify_water_stress(ndvi: f64) -> WaterStressLevel {
    if ndvi > 0.6 {
        WaterStressLevel::None
    } else if ndvi > 0.4 {
        WaterStressLevel::Mild
    } else if ndvi > 0.2 {
        WaterStressLevel::Moderate
    } else {
        WaterStressLevel::Severe
    }
}

/// Maps cloud cover to an imagery quality score in [0, 1]
///
/// `score = (1 - min(cloud / ceiling, 1)) ^ exponent`. The default is linear
/// over 0–100 %; a larger exponent penalizes partial cloud harder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QualityCurve {
    /// Cloud cover at and above which the score is 0
    pub cloud_cover_ceiling_percent: f64,
    pub exponent: f64,
}

impl Default for QualityCurve {
    fn default() -> Self {
        Self {
            cloud_cover_ceiling_percent: 100.0,
            exponent: 1.0,
        }
    }
}

impl QualityCurve {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.cloud_cover_ceiling_percent.is_finite() || self.cloud_cover_ceiling_percent <= 0.0 {
            return Err("Quality curve ceiling must be a positive percentage");
        }
        if !self.exponent.is_finite() || self.exponent <= 0.0 {
            return Err("Quality curve exponent must be positive");
        }
        Ok(())
    }

    pub fn score(&self, cloud_cover_percent: f64) -> f64 {
        let ratio = (cloud_cover_percent / self.cloud_cover_ceiling_percent).clamp(0.0, 1.0);
        (1.0 - ratio).powf(self.exponent)
    }
}

/// Everything the analyzer derives from one provider payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IndexClassification {
    pub indices: VegetationIndices,
    pub cloud_cover_percent: f64,
    pub crop_stage: CropStage,
    pub health_status: HealthStatus,
    pub water_stress_level: WaterStressLevel,
    pub quality_score: f64,
}

/// What to analyze
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub boundary: FieldBoundary,
    pub crop_type: CropType,
    pub analysis_date: NaiveDate,
}

/// Vegetation index analyzer
///
/// Holds the injectable configuration (crop calendar and quality curve);
/// classification itself is stateless.
#[derive(Debug, Clone, Default)]
pub struct VegetationIndexAnalyzer {
    calendar: CropCalendar,
    quality_curve: QualityCurve,
}

impl VegetationIndexAnalyzer {
    pub fn new(calendar: CropCalendar, quality_curve: QualityCurve) -> Self {
        Self {
            calendar,
            quality_curve,
        }
    }

    pub fn calendar(&self) -> &CropCalendar {
        &self.calendar
    }

    pub fn quality_curve(&self) -> &QualityCurve {
        &self.quality_curve
    }

    /// Classify a provider payload for the given request
    ///
    /// Rejects payloads with out-of-range values instead of clamping them.
    pub fn classify(
        &self,
        request: &AnalysisRequest,
        raw: &RawIndices,
    ) -> Result<IndexClassification, &'static str> {
        validate_raw_indices(raw)?;

        let crop_stage = self.calendar.stage_for(request.crop_type, request.analysis_date);
        let soc_vis = if crop_stage.is_bare_soil() {
            raw.soc_vis
        } else {
            None
        };

        Ok(IndexClassification {
            indices: VegetationIndices {
                ndvi: raw.ndvi,
                msavi2: raw.msavi2,
                ndre: raw.ndre,
                ndmi: raw.ndmi,
                soc_vis,
                rvi: raw.rvi,
            },
            cloud_cover_percent: raw.cloud_cover_percent,
            crop_stage,
            health_status: classify_health(raw.ndvi),
            water_stress_level: classify_water_stress(raw.ndvi),
            quality_score: self.quality_curve.score(raw.cloud_cover_percent),
        })
    }
}

/// Status of an analysis record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }
}

impl FromStr for AnalysisStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "completed" => Ok(AnalysisStatus::Completed),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(format!("unknown analysis status: {}", other)),
        }
    }
}

/// One entry in a field's analysis time series
///
/// Created as `pending` and resolved exactly once, to `completed` with a
/// classification or to `failed` with a reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub field_id: Uuid,
    pub analysis_date: NaiveDate,
    pub crop_type: CropType,
    pub status: AnalysisStatus,
    pub classification: Option<IndexClassification>,
    pub failure_reason: Option<String>,
    /// Digest of the request inputs, used to recognize retries
    pub request_fingerprint: String,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AnalysisRecord {
    pub fn pending(
        field_id: Uuid,
        request: &AnalysisRequest,
        request_fingerprint: String,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            field_id,
            analysis_date: request.analysis_date,
            crop_type: request.crop_type,
            status: AnalysisStatus::Pending,
            classification: None,
            failure_reason: None,
            request_fingerprint,
            requested_at,
            resolved_at: None,
        }
    }

    pub fn complete(
        &mut self,
        classification: IndexClassification,
        at: DateTime<Utc>,
    ) -> Result<(), AlreadyResolved> {
        self.ensure_pending()?;
        self.status = AnalysisStatus::Completed;
        self.classification = Some(classification);
        self.resolved_at = Some(at);
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>, at: DateTime<Utc>) -> Result<(), AlreadyResolved> {
        self.ensure_pending()?;
        self.status = AnalysisStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.resolved_at = Some(at);
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == AnalysisStatus::Completed
    }

    fn ensure_pending(&self) -> Result<(), AlreadyResolved> {
        if self.status == AnalysisStatus::Pending {
            Ok(())
        } else {
            Err(AlreadyResolved(self.id))
        }
    }
}
