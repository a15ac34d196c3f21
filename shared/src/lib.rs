//! Shared types and models for the Field Health Monitoring Platform
//!
//! This crate holds the pure part of the field pipeline: geodesy, boundary
//! capture, vegetation index classification and recommendation rules. It is
//! shared between the backend and the browser (via WASM) so both compute
//! the same areas and classifications.

pub mod capture;
pub mod error;
pub mod geodesy;
pub mod geojson;
pub mod models;
pub mod types;
pub mod validation;

pub use capture::*;
pub use error::*;
pub use geodesy::*;
pub use geojson::*;
pub use models::*;
pub use types::*;
pub use validation::*;
