//! Progress, history and result types for the evolution run.

use serde::{Deserialize, Serialize};

/// Per-generation progress record yielded by a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationProgress {
    /// Completed generations (1 after the first Score → Select cycle).
    pub generation: usize,
    /// Best worst-score seen so far.
    pub worst_score: u32,
    /// Aggregate score of that best candidate.
    pub aggregate_score: f64,
    /// Whether this is the final record of the run.
    pub is_complete: bool,
    /// Why the run ended, on the final record.
    pub stop_reason: Option<StopReason>,
}

/// One entry of the append-only metrics log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetrics {
    pub generation: usize,
    /// Best worst-score in this generation.
    pub best_worst_score: u32,
    /// Aggregate score of the generation's best candidate.
    pub best_aggregate_score: f64,
    /// Mean worst-score over the population.
    pub mean_worst_score: f64,
    /// Candidates sent to the worker pool this generation.
    pub scored_candidates: usize,
    /// Wall-clock seconds spent scoring.
    pub scoring_seconds: f64,
}

/// Append-only metrics log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvolutionHistory {
    generations: Vec<GenerationMetrics>,
}

impl EvolutionHistory {
    pub fn record(&mut self, metrics: GenerationMetrics) {
        self.generations.push(metrics);
    }

    pub fn entries(&self) -> &[GenerationMetrics] {
        &self.generations
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    pub fn last(&self) -> Option<&GenerationMetrics> {
        self.generations.last()
    }

    /// Best worst-score per generation, for plotting.
    pub fn best_worst_scores(&self) -> Vec<u32> {
        self.generations.iter().map(|m| m.best_worst_score).collect()
    }
}

/// Controller state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    #[default]
    Initializing,
    Scoring,
    Selecting,
    Mutating,
    Terminated,
}

/// Reason evolution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Best worst-score reached the early-stop threshold.
    EarlyStop,
    /// Generation limit reached.
    MaxGenerations,
    /// Stop requested by the caller or a cancellation source.
    Cancelled,
}

/// Statistics from a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Completed generations.
    pub generations: usize,
    /// Assignments scored over the whole run.
    pub total_evaluations: u64,
    pub best_worst_score: u32,
    pub best_aggregate_score: f64,
    pub elapsed_seconds: f64,
    pub evaluations_per_second: f64,
    pub stop_reason: StopReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_appends_in_order() {
        let mut history = EvolutionHistory::default();
        for generation in 1..=3 {
            history.record(GenerationMetrics {
                generation,
                best_worst_score: 20 + generation as u32,
                best_aggregate_score: 1.0,
                mean_worst_score: 20.0,
                scored_candidates: 4,
                scoring_seconds: 0.01,
            });
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.best_worst_scores(), vec![21, 22, 23]);
        assert_eq!(history.last().map(|m| m.generation), Some(3));
    }

    #[test]
    fn test_progress_serialization() {
        let progress = GenerationProgress {
            generation: 2,
            worst_score: 27,
            aggregate_score: 4.5,
            is_complete: true,
            stop_reason: Some(StopReason::EarlyStop),
        };
        let json = serde_json::to_string(&progress).unwrap();
        let parsed: GenerationProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, progress);
    }
}
