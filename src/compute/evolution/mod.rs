//! Evolutionary search for low cross-talk handle assignments.
//!
//! # Overview
//!
//! The search system consists of:
//!
//! - **Mutation** (`mutation`): random initialization, policy choice and masked rewrites
//! - **Memory** (`memory`): recurring worst offenders across recent generations
//! - **Worker pool** (`pool`): parallel scoring plus pause/resume/stop controls
//! - **Search** (`search`): the population controller
//!
//! # Example
//!
//! ```rust,no_run
//! use crisscross_handles::compute::evolution::EvolutionEngine;
//! use crisscross_handles::schema::{EvolutionConfig, Grid3, Lattice};
//!
//! let mut occupancy = Grid3::new(32, 32, 2);
//! for x in 0..32 {
//!     for y in 0..32 {
//!         occupancy.set(x, y, 0, y as u32 + 1);
//!         occupancy.set(x, y, 1, x as u32 + 1);
//!     }
//! }
//! let lattice = Lattice::square(occupancy).unwrap();
//!
//! let mut engine = EvolutionEngine::new(lattice, EvolutionConfig::default()).unwrap();
//! let result = engine
//!     .run_with_callback(|progress| {
//!         println!("Generation {}: worst score = {}", progress.generation, progress.worst_score);
//!     })
//!     .unwrap();
//!
//! println!("Best worst score: {}", result.best.worst_score());
//! ```
//!
//! # Mutation Policies
//!
//! - `HandlesOnly`: rewrite the handle side of the parent's worst pairs
//! - `AntihandlesOnly`: rewrite the antihandle side of the parent's worst pairs
//! - `Anywhere`: rewrite any structurally valid position

mod memory;
mod mutation;
mod pool;
mod search;

pub use memory::OffenderMemory;
pub use mutation::{HandleAlphabet, HandleRng, MutationPolicy, Mutator};
pub use pool::{CancellationSource, ControlState, RunControl, ScoringPool, pool_size};
pub use search::{EvolutionEngine, EvolutionError, EvolutionResult, EvolutionRun};
