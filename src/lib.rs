//! Crisscross handles - Evolutionary assembly-handle design for slat lattices.
//!
//! Stacked layers of DNA slats bind through handle/antihandle pairs placed
//! where slats of adjacent layers cross. This crate scores how strongly any
//! two slats could bind by accident and evolves handle assignments that keep
//! that cross-talk low.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Lattice, handle assignment, configuration and score types
//! - `compute`: Match scoring, mutation and the evolutionary search
//!
//! # Example
//!
//! ```rust,no_run
//! use crisscross_handles::{
//!     schema::{Grid3, HandleAssignment, Lattice, ScoringConfig},
//!     compute::MatchScorer,
//! };
//!
//! // Two layers of crossing slats
//! let mut occupancy = Grid3::new(8, 8, 2);
//! for x in 0..8 {
//!     for y in 0..8 {
//!         occupancy.set(x, y, 0, y as u32 + 1);
//!         occupancy.set(x, y, 1, x as u32 + 1);
//!     }
//! }
//! let lattice = Lattice::square(occupancy).unwrap();
//!
//! let scorer = MatchScorer::new(&lattice, ScoringConfig::default());
//! let summary = scorer.score(&HandleAssignment::empty_for(&lattice)).unwrap();
//!
//! println!("Worst score: {}", summary.worst_score);
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EvolutionEngine, EvolutionError, EvolutionResult};
pub use compute::{Candidate, MatchScorer, score_assignment};
pub use schema::{EvolutionConfig, HandleAssignment, Lattice, ScoreSummary};
