//! HTTP handlers

pub mod capture;
pub mod field;
pub mod health;

pub use capture::*;
pub use field::*;
pub use health::*;
