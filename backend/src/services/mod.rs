//! Business logic services for the Field Health Monitoring Platform

pub mod analysis;
pub mod capture;
pub mod field;

pub use analysis::AnalysisPipeline;
pub use capture::CaptureRegistry;
pub use field::{AnalysisOutcome, FieldService};
