//! Population controller for the evolutionary handle search.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::compute::{Candidate, LatticeIndex, MatchScorer, ScoringError, ScoringFailure};
use crate::schema::{
    ConfigError, EvolutionConfig, EvolutionHistory, EvolutionPhase, EvolutionStats,
    GenerationMetrics, GenerationProgress, HandleAssignment, Lattice, ShapeMismatchError,
    StopReason,
};

use super::memory::OffenderMemory;
use super::mutation::{HandleRng, Mutator};
use super::pool::{CancellationSource, ControlState, RunControl, ScoringPool};

/// Errors that abort a run without a result.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Shape(#[from] ShapeMismatchError),
    #[error(transparent)]
    Scoring(#[from] ScoringFailure),
    #[error("Run ended before any candidate was scored")]
    NoCandidate,
}

/// Final output of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionResult {
    /// Best candidate seen over the whole run.
    pub best: Candidate,
    pub stats: EvolutionStats,
    pub history: EvolutionHistory,
}

/// An assignment waiting to be scored.
#[derive(Debug, Clone)]
struct Offspring {
    id: u64,
    generation: usize,
    parent: Option<u64>,
    assignment: HandleAssignment,
}

/// Evolution engine that runs the search.
pub struct EvolutionEngine {
    config: EvolutionConfig,
    lattice: Lattice,
    scorer: Arc<MatchScorer>,
    mutator: Mutator,
    rng: HandleRng,
    pool: ScoringPool,
    control: Arc<RunControl>,
    cancellation: Option<Box<dyn CancellationSource>>,
    memory: OffenderMemory,
    seed_assignment: Option<HandleAssignment>,
    /// Survivors after the last selection, ranked best first.
    population: Vec<Candidate>,
    pending: Vec<Offspring>,
    best: Option<Candidate>,
    history: EvolutionHistory,
    phase: EvolutionPhase,
    generation: usize,
    next_id: u64,
    total_evaluations: u64,
    started: Option<Instant>,
    stop_reason: Option<StopReason>,
}

impl EvolutionEngine {
    /// Create a new evolution engine.
    ///
    /// The configuration is validated here, before any scoring work.
    pub fn new(lattice: Lattice, config: EvolutionConfig) -> Result<Self, EvolutionError> {
        config.validate()?;

        let index = Arc::new(LatticeIndex::build(&lattice));
        let scorer = Arc::new(MatchScorer::with_index(
            Arc::clone(&index),
            lattice.assignment_shape(),
            config.scoring.clone(),
        ));
        let mutator = Mutator::new(&lattice, index, &config)?;

        Ok(Self {
            rng: HandleRng::new(config.random_seed),
            pool: ScoringPool::from_config(&config),
            memory: OffenderMemory::new(&config.memory, config.evolution_population),
            config,
            lattice,
            scorer,
            mutator,
            control: Arc::new(RunControl::new()),
            cancellation: None,
            seed_assignment: None,
            population: Vec::new(),
            pending: Vec::new(),
            best: None,
            history: EvolutionHistory::default(),
            phase: EvolutionPhase::Initializing,
            generation: 0,
            next_id: 0,
            total_evaluations: 0,
            started: None,
            stop_reason: None,
        })
    }

    /// Start from a caller-provided assignment plus `P - 1` random ones.
    pub fn with_seed_assignment(
        mut self,
        assignment: HandleAssignment,
    ) -> Result<Self, EvolutionError> {
        self.lattice.check_shape(&assignment)?;
        let illegal = self.lattice.illegal_positions(&assignment);
        if !illegal.is_empty() {
            log::warn!("Rejected seed assignment with {} illegal handles", illegal.len());
            return Err(ConfigError::InvalidSeedAssignment(illegal.len()).into());
        }
        self.seed_assignment = Some(assignment);
        Ok(self)
    }

    /// Consult `source` between generations.
    pub fn with_cancellation_source(mut self, source: impl CancellationSource + 'static) -> Self {
        self.cancellation = Some(Box::new(source));
        self
    }

    /// Handle for pausing, resuming or stopping the run from another thread.
    pub fn control(&self) -> Arc<RunControl> {
        Arc::clone(&self.control)
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn scorer(&self) -> &MatchScorer {
        &self.scorer
    }

    pub fn phase(&self) -> EvolutionPhase {
        self.phase
    }

    /// Completed Score → Select cycles.
    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    /// Best fully scored candidate so far.
    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    /// Current survivors, best first.
    pub fn survivors(&self) -> &[Candidate] {
        &self.population
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Build the initial population.
    pub fn initialize(&mut self) {
        self.population.clear();
        self.pending.clear();
        self.best = None;
        self.history = EvolutionHistory::default();
        self.memory.clear();
        self.generation = 0;
        self.total_evaluations = 0;
        self.stop_reason = None;
        self.phase = EvolutionPhase::Initializing;

        let seeded = self.seed_assignment.clone();
        if seeded.is_some() {
            log::info!("Initial population seeded from a provided assignment");
        }
        for slot in 0..self.config.evolution_population {
            let assignment = match (&seeded, slot) {
                (Some(seed), 0) => seed.clone(),
                _ => self.mutator.random_assignment(&mut self.rng),
            };
            let id = self.next_id();
            self.pending.push(Offspring {
                id,
                generation: 0,
                parent: None,
                assignment,
            });
        }
    }

    /// Score all pending assignments; results are rejoined by population index.
    fn score_pending(&mut self) -> Result<Vec<Candidate>, EvolutionError> {
        let scorer = Arc::clone(&self.scorer);
        let jobs = std::mem::take(&mut self.pending);
        let scores = self
            .pool
            .run(&jobs, |index, offspring| {
                scorer
                    .score(&offspring.assignment)
                    .map_err(|source| ScoringError::Shape { index, source })
            })
            .map_err(|errors| {
                log::warn!(
                    "Generation {} discarded: {} scoring failures",
                    self.generation + 1,
                    errors.len()
                );
                ScoringFailure {
                    generation: self.generation + 1,
                    errors,
                }
            })?;

        self.total_evaluations += jobs.len() as u64;
        Ok(jobs
            .into_iter()
            .zip(scores)
            .map(|(o, score)| Candidate {
                id: o.id,
                generation: o.generation,
                parent: o.parent,
                assignment: o.assignment,
                score,
            })
            .collect())
    }

    /// Rank survivors and fresh children, keep the top `S` and log metrics.
    fn select(&mut self, scored: Vec<Candidate>, scoring_seconds: f64) {
        let scored_candidates = scored.len();
        // survivors were remembered when they were first scored
        for candidate in &scored {
            self.memory.remember(&candidate.score.worst_ledger);
        }

        let mut ranked = std::mem::take(&mut self.population);
        ranked.extend(scored);
        ranked.sort_by(|a, b| a.score.rank_cmp(&b.score));

        if let Some(top) = ranked.first() {
            let improved = self
                .best
                .as_ref()
                .is_none_or(|best| top.score.rank_cmp(&best.score).is_lt());
            if improved {
                self.best = Some(top.clone());
            }

            let mean_worst_score = ranked.iter().map(|c| f64::from(c.worst_score())).sum::<f64>()
                / ranked.len() as f64;
            self.history.record(GenerationMetrics {
                generation: self.generation + 1,
                best_worst_score: top.worst_score(),
                best_aggregate_score: top.aggregate_score(),
                mean_worst_score,
                scored_candidates,
                scoring_seconds,
            });
        }

        ranked.truncate(self.config.generational_survivors);
        self.population = ranked;
    }

    /// Refill the population with children of uniformly chosen survivors.
    fn mutate(&mut self) {
        let remembered = if self.memory.is_enabled() {
            self.memory.recurring()
        } else {
            Vec::new()
        };
        let children = self.config.evolution_population - self.population.len();
        for _ in 0..children {
            let parent = &self.population[self.rng.choose_index(self.population.len())];
            let policy = self.mutator.choose_policy(&mut self.rng);
            let assignment = self.mutator.mutate(
                &mut self.rng,
                &parent.assignment,
                &parent.score.worst_ledger,
                policy,
                &remembered,
            );
            let parent_id = parent.id;
            let id = self.next_id();
            self.pending.push(Offspring {
                id,
                generation: self.generation,
                parent: Some(parent_id),
                assignment,
            });
        }
    }

    /// Get current progress.
    pub fn progress(&self) -> GenerationProgress {
        let (worst_score, aggregate_score) = self
            .best
            .as_ref()
            .map_or((0, 0.0), |b| (b.worst_score(), b.aggregate_score()));
        GenerationProgress {
            generation: self.generation,
            worst_score,
            aggregate_score,
            is_complete: self.phase == EvolutionPhase::Terminated,
            stop_reason: self.stop_reason,
        }
    }

    /// Check if evolution should stop.
    fn should_stop(&mut self, progress: &GenerationProgress) -> Option<StopReason> {
        if let Some(threshold) = self.config.early_stop
            && progress.worst_score >= threshold
        {
            return Some(StopReason::EarlyStop);
        }

        if self.generation >= self.config.evolution_generations {
            return Some(StopReason::MaxGenerations);
        }

        if self.control.is_stopped() {
            return Some(StopReason::Cancelled);
        }

        if let Some(source) = self.cancellation.as_mut()
            && source.should_cancel(progress)
        {
            log::info!("Cancellation requested at generation {}", self.generation);
            return Some(StopReason::Cancelled);
        }

        None
    }

    fn terminate(&mut self, reason: StopReason) -> GenerationProgress {
        self.phase = EvolutionPhase::Terminated;
        self.stop_reason = Some(reason);
        self.pool.teardown();
        let progress = self.progress();
        log::info!(
            "Evolution stopped after {} generations ({:?}): worst score {}",
            self.generation,
            reason,
            progress.worst_score
        );
        progress
    }

    /// Run one Score → Select cycle, then mutate unless the run is over.
    fn step(&mut self) -> Result<GenerationProgress, EvolutionError> {
        if self.generation == 0 && self.pending.is_empty() && self.population.is_empty() {
            self.initialize();
        }

        // Pause and stop are honored only between generations.
        if self.generation > 0 {
            let control = Arc::clone(&self.control);
            let timeout = Duration::from_secs(self.config.pause_timeout_secs);
            let state = control.wait_while_paused(timeout, || self.pool.teardown());
            if state == ControlState::Stopped {
                return Ok(self.terminate(StopReason::Cancelled));
            }
        }

        self.phase = EvolutionPhase::Scoring;
        let scoring_started = Instant::now();
        let scored = self.score_pending().inspect_err(|_| {
            self.phase = EvolutionPhase::Terminated;
        })?;
        let scoring_seconds = scoring_started.elapsed().as_secs_f64();

        self.phase = EvolutionPhase::Selecting;
        self.select(scored, scoring_seconds);
        self.generation += 1;

        let progress = self.progress();
        if let Some(last) = self.history.last() {
            log::info!(
                "Generation {}: best worst score {} (aggregate {:.3}), mean {:.2}, scored {} in {:.3}s",
                last.generation,
                last.best_worst_score,
                last.best_aggregate_score,
                last.mean_worst_score,
                last.scored_candidates,
                last.scoring_seconds
            );
        }

        if let Some(reason) = self.should_stop(&progress) {
            return Ok(self.terminate(reason));
        }

        self.phase = EvolutionPhase::Mutating;
        self.mutate();
        Ok(progress)
    }

    /// Lazy, finite sequence of per-generation progress records.
    ///
    /// The sequence ends after the record with `is_complete` set, or after
    /// the first error.
    pub fn iter(&mut self) -> EvolutionRun<'_> {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        EvolutionRun { engine: self }
    }

    /// Result of a terminated run.
    pub fn result(&self) -> Result<EvolutionResult, EvolutionError> {
        let best = self.best.clone().ok_or(EvolutionError::NoCandidate)?;
        let elapsed = self
            .started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let evaluations_per_second = if elapsed > 0.0 {
            self.total_evaluations as f64 / elapsed
        } else {
            0.0
        };

        Ok(EvolutionResult {
            stats: EvolutionStats {
                generations: self.generation,
                total_evaluations: self.total_evaluations,
                best_worst_score: best.worst_score(),
                best_aggregate_score: best.aggregate_score(),
                elapsed_seconds: elapsed,
                evaluations_per_second,
                stop_reason: self.stop_reason.unwrap_or(StopReason::Cancelled),
            },
            best,
            history: self.history.clone(),
        })
    }

    /// Run evolution with progress callback.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<EvolutionResult, EvolutionError>
    where
        F: FnMut(&GenerationProgress),
    {
        self.started = Some(Instant::now());
        self.initialize();
        for progress in self.iter() {
            callback(&progress?);
        }
        self.result()
    }

    /// Run evolution (blocking).
    pub fn run(&mut self) -> Result<EvolutionResult, EvolutionError> {
        self.run_with_callback(|_| {})
    }
}

/// Progress iterator borrowed from an [`EvolutionEngine`].
pub struct EvolutionRun<'a> {
    engine: &'a mut EvolutionEngine,
}

impl Iterator for EvolutionRun<'_> {
    type Item = Result<GenerationProgress, EvolutionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.engine.phase == EvolutionPhase::Terminated {
            return None;
        }
        Some(self.engine.step())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::score_assignment;
    use crate::schema::{Grid3, MutationTypeProbabilities};
    use std::thread;
    use tempfile::tempdir;

    /// Square lattice of crossing slats: layer 0 along x, layer 1 along y.
    fn crossed(size: usize) -> Lattice {
        let mut occ = Grid3::new(size, size, 2);
        for x in 0..size {
            for y in 0..size {
                occ.set(x, y, 0, y as u32 + 1);
                occ.set(x, y, 1, x as u32 + 1);
            }
        }
        Lattice::square(occ).unwrap()
    }

    fn config(population: usize, generations: usize) -> EvolutionConfig {
        EvolutionConfig {
            evolution_population: population,
            evolution_generations: generations,
            generational_survivors: 2,
            mutation_rate: 0.1,
            unique_handle_sequences: 6,
            process_count: Some(2),
            random_seed: 42,
            ..Default::default()
        }
    }

    #[test]
    fn test_survivors_must_be_fewer_than_population() {
        let config = EvolutionConfig {
            evolution_population: 4,
            generational_survivors: 4,
            ..Default::default()
        };
        let err = EvolutionEngine::new(crossed(4), config).err().unwrap();
        assert!(matches!(
            err,
            EvolutionError::Config(ConfigError::SurvivorsOutOfRange { .. })
        ));
    }

    #[test]
    fn test_initialize_builds_population() {
        let mut engine = EvolutionEngine::new(crossed(6), config(8, 3)).unwrap();
        engine.initialize();
        assert_eq!(engine.pending.len(), 8);
        assert_eq!(engine.phase(), EvolutionPhase::Initializing);
        for o in &engine.pending {
            assert!(engine.lattice().illegal_positions(&o.assignment).is_empty());
        }
    }

    #[test]
    fn test_run_to_max_generations() {
        let mut engine = EvolutionEngine::new(crossed(6), config(8, 4)).unwrap();
        let mut records = Vec::new();
        let result = engine.run_with_callback(|p| records.push(p.clone())).unwrap();

        assert_eq!(result.stats.generations, 4);
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(records.len(), 4);
        assert!(records.last().unwrap().is_complete);
        assert!(records[..3].iter().all(|p| !p.is_complete));
        // 8 initial + 6 children per later generation
        assert_eq!(result.stats.total_evaluations, 8 + 3 * 6);
        assert_eq!(result.history.len(), 4);
        assert_eq!(engine.phase(), EvolutionPhase::Terminated);
    }

    #[test]
    fn test_best_worst_score_never_regresses() {
        let mut engine = EvolutionEngine::new(crossed(8), config(10, 12)).unwrap();
        let result = engine.run().unwrap();
        let scores = result.history.best_worst_scores();
        assert!(scores.windows(2).all(|w| w[1] >= w[0]), "{scores:?}");
        assert_eq!(result.best.worst_score(), *scores.iter().max().unwrap());
    }

    #[test]
    fn test_candidates_stay_structurally_valid() {
        let mut occ = Grid3::new(6, 6, 3);
        for x in 0..6 {
            for y in 0..6 {
                occ.set(x, y, 0, y as u32 + 1);
                occ.set(x, y, 1, x as u32 + 1);
                if x < 3 {
                    occ.set(x, y, 2, y as u32 + 1);
                }
            }
        }
        let lattice = Lattice::square(occ).unwrap();
        let config = EvolutionConfig {
            mutation_rate: 0.5,
            split_sequence_handles: true,
            mutation_type_probabilities: MutationTypeProbabilities {
                handles: 0.3,
                antihandles: 0.3,
                anywhere: 0.4,
            },
            ..config(6, 6)
        };
        let mut engine = EvolutionEngine::new(lattice, config).unwrap();
        engine.initialize();
        while engine.phase() != EvolutionPhase::Terminated {
            engine.step().unwrap();
            for c in engine.survivors() {
                assert!(engine.lattice().illegal_positions(&c.assignment).is_empty());
            }
            for o in &engine.pending {
                assert!(engine.lattice().illegal_positions(&o.assignment).is_empty());
            }
        }
        assert_eq!(engine.generation(), 6);
    }

    #[test]
    fn test_early_stop_after_single_generation() {
        let lattice = crossed(6);
        let config = EvolutionConfig {
            early_stop: Some(0),
            ..config(6, 1)
        };
        let mut engine = EvolutionEngine::new(lattice.clone(), config.clone()).unwrap();
        let result = engine.run().unwrap();

        assert_eq!(result.stats.generations, 1);
        assert_eq!(result.stats.stop_reason, StopReason::EarlyStop);
        assert_eq!(result.stats.total_evaluations, 6);
        assert_eq!(result.best.generation, 0);

        let rescored = score_assignment(&lattice, &result.best.assignment, &config.scoring).unwrap();
        assert_eq!(rescored.worst_score(), result.best.worst_score());
        assert_eq!(rescored.score.histogram, result.best.score.histogram);
    }

    #[test]
    fn test_stop_returns_scored_candidate() {
        let mut engine = EvolutionEngine::new(crossed(6), config(6, 50)).unwrap();
        engine.control().stop();
        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 1);
        assert_eq!(result.best.score.histogram.total(), 36);
    }

    #[test]
    fn test_cancellation_source_consulted() {
        let mut engine = EvolutionEngine::new(crossed(6), config(6, 50))
            .unwrap()
            .with_cancellation_source(|p: &GenerationProgress| p.generation >= 3);
        let result = engine.run().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
        assert_eq!(result.stats.generations, 3);
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let run = || {
            let mut engine = EvolutionEngine::new(crossed(6), config(8, 5)).unwrap();
            engine.run().unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.best.assignment, b.best.assignment);
        assert_eq!(a.history.best_worst_scores(), b.history.best_worst_scores());
        assert_eq!(
            a.best.aggregate_score().to_bits(),
            b.best.aggregate_score().to_bits()
        );
    }

    #[test]
    fn test_seed_assignment_enters_population() {
        let lattice = crossed(4);
        let mut seed = HandleAssignment::empty_for(&lattice);
        seed.set(1, 1, 0, 3);
        let mut engine = EvolutionEngine::new(lattice, config(4, 1))
            .unwrap()
            .with_seed_assignment(seed.clone())
            .unwrap();
        engine.initialize();
        assert_eq!(engine.pending[0].assignment, seed);
    }

    #[test]
    fn test_illegal_seed_rejected() {
        let mut occ = Grid3::new(3, 3, 2);
        occ.set(0, 0, 0, 1);
        occ.set(0, 0, 1, 1);
        let lattice = Lattice::square(occ).unwrap();
        let mut seed = HandleAssignment::empty_for(&lattice);
        seed.set(2, 2, 0, 1);
        let err = EvolutionEngine::new(lattice, config(4, 1))
            .unwrap()
            .with_seed_assignment(seed)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            EvolutionError::Config(ConfigError::InvalidSeedAssignment(1))
        ));
    }

    #[test]
    fn test_progress_iterator_is_finite() {
        let mut engine = EvolutionEngine::new(crossed(4), config(4, 3)).unwrap();
        let records: Vec<_> = engine.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 3);
        assert!(engine.iter().next().is_none());
    }

    #[test]
    fn test_memory_stores_each_candidate_once() {
        let lattice = crossed(4);
        let config = config(4, 5);
        let mut engine = EvolutionEngine::new(lattice.clone(), config.clone()).unwrap();
        engine.initialize();

        let blank = HandleAssignment::empty_for(&lattice);
        let offender = score_assignment(&lattice, &blank, &config.scoring).unwrap();
        assert!(!offender.score.worst_ledger.is_empty());
        let mut clean = offender.clone();
        clean.score.worst_ledger.clear();

        engine.select(vec![offender], 0.0);
        assert!(engine.memory.recurring().is_empty());

        // the offender survives but is not stored a second time
        engine.select(vec![clean.clone(), clean.clone(), clean], 0.0);
        assert_eq!(engine.memory.len(), 4);
        assert!(engine.memory.recurring().is_empty());
    }

    #[test]
    fn test_memory_skips_carried_survivors() {
        let mut engine = EvolutionEngine::new(crossed(6), config(6, 3)).unwrap();
        engine.initialize();
        engine.step().unwrap();
        assert_eq!(engine.memory.len(), 6);
        engine.step().unwrap();
        // four fresh children, two survivors already stored
        assert_eq!(engine.memory.len(), 10);
    }

    #[test]
    fn test_scoring_failure_discards_generation() {
        let mut engine = EvolutionEngine::new(crossed(4), config(4, 3)).unwrap();
        engine.initialize();
        engine.pending[2].assignment = HandleAssignment::from_grid(Grid3::new(3, 3, 1));

        match engine.iter().next() {
            Some(Err(EvolutionError::Scoring(failure))) => {
                assert_eq!(failure.generation, 1);
                assert_eq!(failure.errors.len(), 1);
                assert!(matches!(
                    failure.errors[0],
                    ScoringError::Shape { index: 2, .. }
                ));
            }
            other => panic!("expected a scoring failure, got {other:?}"),
        }
        assert_eq!(engine.phase(), EvolutionPhase::Terminated);
        assert!(engine.iter().next().is_none());
        assert!(engine.best().is_none());
        assert!(engine.history().is_empty());
        assert!(matches!(engine.result(), Err(EvolutionError::NoCandidate)));
    }

    #[test]
    fn test_long_pause_releases_pool() {
        let config = EvolutionConfig {
            pause_timeout_secs: 0,
            ..config(4, 3)
        };
        let mut engine = EvolutionEngine::new(crossed(4), config).unwrap();
        engine.initialize();
        engine.step().unwrap();
        assert!(engine.pool.is_running());
        assert_eq!(engine.pool.spawn_count(), 1);

        let control = engine.control();
        control.pause();
        let resumer = {
            let control = Arc::clone(&control);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                control.resume();
            })
        };
        engine.step().unwrap();
        resumer.join().unwrap();

        // torn down while paused, respawned for the next scoring pass
        assert_eq!(engine.pool.spawn_count(), 2);
        assert_eq!(engine.generation(), 2);

        let last = engine.step().unwrap();
        assert!(last.is_complete);
        assert!(!engine.pool.is_running());
        let result = engine.result().unwrap();
        assert_eq!(result.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(result.history.len(), 3);
    }

    #[test]
    fn test_result_survives_json_file() {
        let mut engine = EvolutionEngine::new(crossed(4), config(4, 2)).unwrap();
        let result = engine.run().unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("design.result.json");
        std::fs::write(&path, serde_json::to_string_pretty(&result).unwrap()).unwrap();
        let loaded: EvolutionResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(loaded.best.assignment, result.best.assignment);
        assert_eq!(loaded.best.score.worst_ledger, result.best.score.worst_ledger);
        assert_eq!(loaded.stats.stop_reason, StopReason::MaxGenerations);
        assert_eq!(loaded.history.len(), 2);
    }
}
