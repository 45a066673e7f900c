//! Compute module - Scoring and search over handle assignments.

mod correlation;
mod scoring;
mod slats;

pub mod evolution;

pub use correlation::*;
pub use scoring::*;
pub use slats::*;
