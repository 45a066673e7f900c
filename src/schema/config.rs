//! Configuration types for the handle evolution run and the scoring engine.

use serde::{Deserialize, Serialize};

use super::ComponentKey;

/// Top-level configuration for an evolutionary handle search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of candidates per generation.
    #[serde(default = "default_population")]
    pub evolution_population: usize,
    /// Maximum number of generations (Score → Select cycles).
    #[serde(default = "default_generations")]
    pub evolution_generations: usize,
    /// Best candidates carried unchanged into the next generation.
    #[serde(default = "default_survivors")]
    pub generational_survivors: usize,
    /// Probability of rewriting each eligible handle position.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Distribution over mutation policies.
    #[serde(default)]
    pub mutation_type_probabilities: MutationTypeProbabilities,
    /// Alphabet size K: handles are drawn from `1..=K`.
    #[serde(default = "default_unique_handles")]
    pub unique_handle_sequences: u16,
    /// Split the alphabet in half by interface parity.
    #[serde(default)]
    pub split_sequence_handles: bool,
    /// Stop once the best worst-score reaches this value.
    #[serde(default)]
    pub early_stop: Option<u32>,
    /// Seed for initialization and mutation.
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    /// Explicit scoring worker count; overrides `cpu_fraction`.
    #[serde(default)]
    pub process_count: Option<usize>,
    /// Share of available parallelism given to the scoring pool.
    #[serde(default = "default_cpu_fraction")]
    pub cpu_fraction: f64,
    /// Hall-of-shame memory across generations.
    #[serde(default)]
    pub memory: MemoryConfig,
    /// Match scoring options.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Seconds a paused run keeps its worker pool before tearing it down.
    #[serde(default = "default_pause_timeout")]
    pub pause_timeout_secs: u64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            evolution_population: default_population(),
            evolution_generations: default_generations(),
            generational_survivors: default_survivors(),
            mutation_rate: default_mutation_rate(),
            mutation_type_probabilities: MutationTypeProbabilities::default(),
            unique_handle_sequences: default_unique_handles(),
            split_sequence_handles: false,
            early_stop: None,
            random_seed: default_random_seed(),
            process_count: None,
            cpu_fraction: default_cpu_fraction(),
            memory: MemoryConfig::default(),
            scoring: ScoringConfig::default(),
            pause_timeout_secs: default_pause_timeout(),
        }
    }
}

fn default_population() -> usize {
    30
}
fn default_generations() -> usize {
    200
}
fn default_survivors() -> usize {
    3
}
fn default_mutation_rate() -> f64 {
    0.03
}
fn default_unique_handles() -> u16 {
    32
}
fn default_random_seed() -> u64 {
    8
}
fn default_cpu_fraction() -> f64 {
    0.75
}
fn default_pause_timeout() -> u64 {
    300
}

/// Probabilities of the three mutation policies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MutationTypeProbabilities {
    /// Target the handle side of the worst pairs.
    pub handles: f64,
    /// Target the antihandle side of the worst pairs.
    pub antihandles: f64,
    /// Mutate anywhere in the structure.
    pub anywhere: f64,
}

impl Default for MutationTypeProbabilities {
    fn default() -> Self {
        Self {
            handles: 0.425,
            antihandles: 0.425,
            anywhere: 0.15,
        }
    }
}

impl MutationTypeProbabilities {
    /// Weights in policy order (handles, antihandles, anywhere).
    pub fn weights(&self) -> [f64; 3] {
        [self.handles, self.antihandles, self.anywhere]
    }
}

/// Memory of worst-offending pairs across generations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Generations remembered (0 disables memory).
    #[serde(default = "default_memory_length")]
    pub length: usize,
    /// Appearances needed before a remembered position joins a targeted mask.
    #[serde(default = "default_memory_repeats")]
    pub min_repeats: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            length: default_memory_length(),
            min_repeats: default_memory_repeats(),
        }
    }
}

fn default_memory_length() -> usize {
    10
}
fn default_memory_repeats() -> usize {
    2
}

/// Match scoring options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScoringConfig {
    /// Which handle/antihandle pairs are compared.
    #[serde(default)]
    pub eligibility: EligibilityMode,
    /// Rotation coverage of the alignment search.
    #[serde(default)]
    pub rotation_mode: RotationMode,
    /// Histogram weighting for the aggregate score.
    #[serde(default)]
    pub weighting: AggregateWeighting,
    /// Also compute the substitution-risk score.
    #[serde(default)]
    pub substitution_risk: bool,
}

/// Pair eligibility for scoring.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(tag = "mode")]
pub enum EligibilityMode {
    /// Every handle vector against every antihandle vector.
    #[default]
    Universal,
    /// Only vectors that share an interface.
    PerLayer,
    /// Only vectors of components in the same group.
    Grouped { groups: Vec<Vec<ComponentKey>> },
}

/// Rotation coverage of the alignment search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum RotationMode {
    /// Evaluate every lattice rotation for every pair.
    #[default]
    Exact,
    /// Approximation: skip off-axis rotations when both operands are linear.
    /// A perpendicular crossing of two linear components overlaps in at most
    /// one cell, so this can only miss worst-scores of `L - 1` or higher.
    SkipOffAxisForLinear,
}

/// Weighting of the histogram into the aggregate score (lower is better).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum AggregateWeighting {
    /// Soft maximum of match counts: `ln(Σ n_b · e^(f·(L−b))) / f`.
    Exponential { fudge: f64 },
    /// Plain sum of match counts: `Σ n_b · (L − b)`.
    Linear,
}

impl Default for AggregateWeighting {
    fn default() -> Self {
        Self::Exponential { fudge: 1.0 }
    }
}

impl EvolutionConfig {
    /// Validate configuration before any work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.evolution_population < 2 {
            return Err(ConfigError::PopulationTooSmall(self.evolution_population));
        }
        if self.generational_survivors == 0
            || self.generational_survivors >= self.evolution_population
        {
            return Err(ConfigError::SurvivorsOutOfRange {
                survivors: self.generational_survivors,
                population: self.evolution_population,
            });
        }
        if self.evolution_generations == 0 {
            return Err(ConfigError::NoGenerations);
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::InvalidMutationRate(self.mutation_rate));
        }

        let weights = self.mutation_type_probabilities.weights();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::InvalidProbabilities(format!(
                "{weights:?} contains a negative or non-finite entry"
            )));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidProbabilities(format!(
                "{weights:?} sums to {total}, expected 1"
            )));
        }

        if self.unique_handle_sequences == 0 {
            return Err(ConfigError::EmptyAlphabet);
        }
        if self.split_sequence_handles
            && (self.unique_handle_sequences < 2 || self.unique_handle_sequences % 2 != 0)
        {
            return Err(ConfigError::InvalidSplitAlphabet(
                self.unique_handle_sequences,
            ));
        }

        if self.process_count == Some(0) {
            return Err(ConfigError::InvalidProcessCount);
        }
        if !(self.cpu_fraction > 0.0 && self.cpu_fraction <= 1.0) {
            return Err(ConfigError::InvalidCpuFraction(self.cpu_fraction));
        }
        if self.memory.length > 0 && self.memory.min_repeats == 0 {
            return Err(ConfigError::InvalidMemory);
        }

        self.scoring.validate()
    }
}

impl ScoringConfig {
    /// Validate scoring options.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let AggregateWeighting::Exponential { fudge } = self.weighting
            && !(fudge.is_finite() && fudge > 0.0)
        {
            return Err(ConfigError::InvalidFudge(fudge));
        }
        if let EligibilityMode::Grouped { groups } = &self.eligibility
            && groups.iter().any(Vec::is_empty)
        {
            return Err(ConfigError::EmptyGroup);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Population must hold at least 2 candidates, got {0}")]
    PopulationTooSmall(usize),
    #[error("Generational survivors ({survivors}) must be in 1..{population}")]
    SurvivorsOutOfRange { survivors: usize, population: usize },
    #[error("At least one generation is required")]
    NoGenerations,
    #[error("Mutation rate {0} outside [0, 1]")]
    InvalidMutationRate(f64),
    #[error("Invalid mutation type probabilities: {0}")]
    InvalidProbabilities(String),
    #[error("Handle alphabet must contain at least one sequence")]
    EmptyAlphabet,
    #[error("Split handle alphabet needs an even size of at least 2, got {0}")]
    InvalidSplitAlphabet(u16),
    #[error("Process count must be non-zero")]
    InvalidProcessCount,
    #[error("CPU fraction {0} outside (0, 1]")]
    InvalidCpuFraction(f64),
    #[error("Memory repeat threshold must be non-zero")]
    InvalidMemory,
    #[error("Exponential weighting fudge {0} must be positive and finite")]
    InvalidFudge(f64),
    #[error("Scoring groups must not be empty")]
    EmptyGroup,
    #[error("Seed assignment places handles at {0} positions without a binding site")]
    InvalidSeedAssignment(usize),
}
