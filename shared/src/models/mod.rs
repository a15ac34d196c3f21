//! Domain models for the Field Health Monitoring Platform

mod analysis;
mod crop;
mod field;
mod recommendation;

pub use analysis::*;
pub use crop::*;
pub use field::*;
pub use recommendation::*;
