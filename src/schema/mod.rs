//! Schema module - Lattice, configuration and score types.

mod config;
mod evolution;
mod lattice;
mod score;

pub use config::*;
pub use evolution::*;
pub use lattice::*;
pub use score::*;
