//! Recommendation models and the rule engine that derives them
//!
//! Every rule is evaluated against every analysis. Rules do not suppress
//! each other, and the output keeps rule declaration order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CropStage, CropType, IndexClassification, WaterStressLevel};

/// Urgency of a recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Area of farm work a recommendation concerns
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Irrigation,
    Fertilizer,
    Pesticide,
    Harvest,
}

impl RecommendationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationCategory::Irrigation => "irrigation",
            RecommendationCategory::Fertilizer => "fertilizer",
            RecommendationCategory::Pesticide => "pesticide",
            RecommendationCategory::Harvest => "harvest",
        }
    }
}

impl FromStr for RecommendationCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "irrigation" => Ok(RecommendationCategory::Irrigation),
            "fertilizer" => Ok(RecommendationCategory::Fertilizer),
            "pesticide" => Ok(RecommendationCategory::Pesticide),
            "harvest" => Ok(RecommendationCategory::Harvest),
            other => Err(format!("unknown recommendation category: {}", other)),
        }
    }
}

/// Rule output before it is attached to a field and analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: RecommendationCategory,
    pub action_items: Vec<String>,
    /// Indicative cost in INR
    pub estimated_cost: Decimal,
    pub timeline: String,
}

/// A stored recommendation
///
/// Content is fixed at creation; only the implementation flag and the
/// farmer's feedback change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub id: Uuid,
    pub field_id: Uuid,
    pub analysis_id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: RecommendationCategory,
    pub action_items: Vec<String>,
    pub estimated_cost: Decimal,
    pub timeline: String,
    pub implemented: bool,
    pub farmer_feedback: Option<String>,
    pub implemented_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn from_draft(
        field_id: Uuid,
        analysis_id: Uuid,
        draft: RecommendationDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            field_id,
            analysis_id,
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            category: draft.category,
            action_items: draft.action_items,
            estimated_cost: draft.estimated_cost,
            timeline: draft.timeline,
            implemented: false,
            farmer_feedback: None,
            implemented_at: None,
            created_at,
        }
    }

    /// Record that the farmer acted on this recommendation
    ///
    /// Marking twice keeps the first timestamp; new feedback replaces old.
    pub fn mark_implemented(&mut self, feedback: Option<String>, at: DateTime<Utc>) {
        if !self.implemented {
            self.implemented = true;
            self.implemented_at = Some(at);
        }
        if let Some(feedback) = feedback.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()) {
            self.farmer_feedback = Some(feedback);
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Inputs a rule may look at
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub classification: &'a IndexClassification,
    pub crop_type: CropType,
}

/// A single recommendation rule
pub trait RecommendationRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RecommendationDraft>;
}

/// Tunable thresholds for the built-in rules
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RuleThresholds {
    /// Fertilizer rule fires when NDVI is strictly below this
    pub fertilizer_ndvi_below: f64,
    /// Harvest rule fires in the reproductive stage when NDVI is strictly above this
    pub harvest_ndvi_above: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            fertilizer_ndvi_below: 0.4,
            harvest_ndvi_above: 0.6,
        }
    }
}

/// Low canopy vigor suggests a nutrient deficit
#[derive(Debug, Clone, Copy)]
pub struct LowVigorFertilizerRule {
    pub ndvi_below: f64,
}

impl RecommendationRule for LowVigorFertilizerRule {
    fn name(&self) -> &'static str {
        "low_vigor_fertilizer"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RecommendationDraft> {
        let ndvi = ctx.classification.indices.ndvi;
        if ndvi >= self.ndvi_below {
            return None;
        }
        Some(RecommendationDraft {
            title: "Improve crop nutrition".to_string(),
            description: format!(
                "{} canopy vigor is low (NDVI {:.2}). Nutrient deficiency or pest pressure is likely.",
                ctx.crop_type, ndvi
            ),
            priority: Priority::High,
            category: RecommendationCategory::Fertilizer,
            action_items: vec![
                "Conduct a soil nutrient test".to_string(),
                "Apply nitrogen-rich fertilizer".to_string(),
                "Inspect plants for pest damage".to_string(),
            ],
            estimated_cost: Decimal::new(2500, 0),
            timeline: "1-2 weeks".to_string(),
        })
    }
}

/// Moderate or severe water stress needs irrigation attention
#[derive(Debug, Clone, Copy, Default)]
pub struct WaterStressIrrigationRule;

impl RecommendationRule for WaterStressIrrigationRule {
    fn name(&self) -> &'static str {
        "water_stress_irrigation"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RecommendationDraft> {
        let priority = match ctx.classification.water_stress_level {
            WaterStressLevel::Severe => Priority::Critical,
            WaterStressLevel::Moderate => Priority::High,
            WaterStressLevel::None | WaterStressLevel::Mild => return None,
        };
        Some(RecommendationDraft {
            title: "Address water stress".to_string(),
            description: format!(
                "The {} field shows {} water stress. Check irrigation before yield is affected.",
                ctx.crop_type.as_str(),
                ctx.classification.water_stress_level
            ),
            priority,
            category: RecommendationCategory::Irrigation,
            action_items: vec![
                "Inspect the irrigation system".to_string(),
                "Consider drip irrigation".to_string(),
                "Monitor soil moisture".to_string(),
            ],
            estimated_cost: Decimal::new(15000, 0),
            timeline: "Immediate".to_string(),
        })
    }
}

/// A vigorous canopy in the reproductive stage is nearing harvest
#[derive(Debug, Clone, Copy)]
pub struct HarvestReadinessRule {
    pub ndvi_above: f64,
}

impl RecommendationRule for HarvestReadinessRule {
    fn name(&self) -> &'static str {
        "harvest_readiness"
    }

    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RecommendationDraft> {
        let classification = ctx.classification;
        if classification.crop_stage != CropStage::Reproductive
            || classification.indices.ndvi <= self.ndvi_above
        {
            return None;
        }
        Some(RecommendationDraft {
            title: "Prepare for harvest".to_string(),
            description: format!(
                "{} is in the reproductive stage with a healthy canopy. Plan the harvest now.",
                ctx.crop_type
            ),
            priority: Priority::Medium,
            category: RecommendationCategory::Harvest,
            action_items: vec![
                "Monitor grain filling".to_string(),
                "Plan harvest logistics".to_string(),
                "Arrange storage".to_string(),
            ],
            estimated_cost: Decimal::new(5000, 0),
            timeline: "2-4 weeks".to_string(),
        })
    }
}

/// Evaluates an ordered rule set against an analysis
pub struct RecommendationEngine {
    rules: Vec<Box<dyn RecommendationRule>>,
}

impl fmt::Debug for RecommendationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecommendationEngine")
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new(RuleThresholds::default())
    }
}

impl RecommendationEngine {
    /// Built-in rules: fertilizer, irrigation, harvest
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self::with_rules(vec![
            Box::new(LowVigorFertilizerRule {
                ndvi_below: thresholds.fertilizer_ndvi_below,
            }),
            Box::new(WaterStressIrrigationRule),
            Box::new(HarvestReadinessRule {
                ndvi_above: thresholds.harvest_ndvi_above,
            }),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn RecommendationRule>>) -> Self {
        Self { rules }
    }

    /// Append a rule after the existing ones
    pub fn push_rule(&mut self, rule: Box<dyn RecommendationRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// All drafts whose rule matched, in rule order
    pub fn recommend(
        &self,
        classification: &IndexClassification,
        crop_type: CropType,
    ) -> Vec<RecommendationDraft> {
        let ctx = RuleContext {
            classification,
            crop_type,
        };
        self.rules.iter().filter_map(|rule| rule.evaluate(&ctx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{classify_health, classify_water_stress, VegetationIndices};

    fn classification(ndvi: f64, stage: CropStage) -> IndexClassification {
        IndexClassification {
            indices: VegetationIndices {
                ndvi,
                msavi2: 0.3,
                ndre: 0.2,
                ndmi: 0.1,
                soc_vis: None,
                rvi: 1.0,
            },
            cloud_cover_percent: 10.0,
            crop_stage: stage,
            health_status: classify_health(ndvi),
            water_stress_level: classify_water_stress(ndvi),
            quality_score: 0.9,
        }
    }

    #[test]
    fn test_fertilizer_and_irrigation_fire_together() {
        let engine = RecommendationEngine::default();
        let mut c = classification(0.35, CropStage::Vegetative);
        c.water_stress_level = WaterStressLevel::Severe;
        let drafts = engine.recommend(&c, CropType::Rice);

        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].category, RecommendationCategory::Fertilizer);
        assert_eq!(drafts[0].priority, Priority::High);
        assert_eq!(drafts[0].timeline, "1-2 weeks");
        assert_eq!(drafts[1].category, RecommendationCategory::Irrigation);
        assert_eq!(drafts[1].priority, Priority::Critical);
        assert_eq!(drafts[1].timeline, "Immediate");
    }

    #[test]
    fn test_moderate_stress_is_high_priority() {
        let engine = RecommendationEngine::default();
        let drafts = engine.recommend(&classification(0.3, CropStage::Vegetative), CropType::Maize);
        let irrigation = drafts
            .iter()
            .find(|d| d.category == RecommendationCategory::Irrigation)
            .unwrap();
        assert_eq!(irrigation.priority, Priority::High);
    }

    #[test]
    fn test_harvest_rule_needs_reproductive_stage() {
        let engine = RecommendationEngine::default();
        let drafts = engine.recommend(&classification(0.75, CropStage::Reproductive), CropType::Wheat);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].category, RecommendationCategory::Harvest);
        assert_eq!(drafts[0].priority, Priority::Medium);
        assert_eq!(
            drafts[0].action_items,
            vec!["Monitor grain filling", "Plan harvest logistics", "Arrange storage"]
        );

        assert!(engine
            .recommend(&classification(0.75, CropStage::Vegetative), CropType::Wheat)
            .is_empty());
        // boundary: 0.6 is not above 0.6
        assert!(engine
            .recommend(&classification(0.6, CropStage::Reproductive), CropType::Wheat)
            .is_empty());
    }

    #[test]
    fn test_fertilizer_threshold_is_strict() {
        let engine = RecommendationEngine::default();
        let drafts = engine.recommend(&classification(0.4, CropStage::Vegetative), CropType::Cotton);
        assert!(drafts
            .iter()
            .all(|d| d.category != RecommendationCategory::Fertilizer));
    }

    struct PestScoutRule;

    impl RecommendationRule for PestScoutRule {
        fn name(&self) -> &'static str {
            "pest_scout"
        }

        fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RecommendationDraft> {
            (ctx.classification.indices.ndre < 0.25).then(|| RecommendationDraft {
                title: "Scout for pests".to_string(),
                description: String::new(),
                priority: Priority::Low,
                category: RecommendationCategory::Pesticide,
                action_items: vec!["Walk the field edges".to_string()],
                estimated_cost: Decimal::ZERO,
                timeline: "This week".to_string(),
            })
        }
    }

    #[test]
    fn test_custom_rules_append_in_order() {
        let mut engine = RecommendationEngine::default();
        engine.push_rule(Box::new(PestScoutRule));
        assert_eq!(
            engine.rule_names(),
            vec!["low_vigor_fertilizer", "water_stress_irrigation", "harvest_readiness", "pest_scout"]
        );
        let drafts = engine.recommend(&classification(0.25, CropStage::Vegetative), CropType::Soybean);
        let categories: Vec<_> = drafts.iter().map(|d| d.category).collect();
        assert_eq!(
            categories,
            vec![
                RecommendationCategory::Fertilizer,
                RecommendationCategory::Irrigation,
                RecommendationCategory::Pesticide
            ]
        );
    }

    #[test]
    fn test_mark_implemented_keeps_first_timestamp() {
        let draft = RecommendationEngine::default()
            .recommend(&classification(0.1, CropStage::Vegetative), CropType::Rice)
            .remove(0);
        let mut rec = Recommendation::from_draft(Uuid::new_v4(), Uuid::new_v4(), draft, Utc::now());
        assert!(!rec.implemented);

        let first = Utc::now();
        rec.mark_implemented(None, first);
        rec.mark_implemented(Some("Applied urea".to_string()), first + chrono::Duration::days(1));
        assert!(rec.implemented);
        assert_eq!(rec.implemented_at, Some(first));
        assert_eq!(rec.farmer_feedback.as_deref(), Some("Applied urea"));
    }
}
