//! Match scoring engine: worst-case cross-reactivity of a handle assignment.
//!
//! Every eligible (handle vector, antihandle vector) pair is compared with the
//! alignment kernel and reduced to its pair score. Pair scores are collected
//! into a [`Histogram`]; the pairs sitting in its lowest bucket form the
//! worst ledger used to target mutation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::{
    ComponentKey, EligibilityMode, Face, HandleAssignment, Histogram, Lattice, LedgerEntry,
    RotationMode, ScoreSummary, ScoringConfig, ShapeMismatchError,
};

use super::correlation::{MatchRecord, ProjectedVector, match_vectors};
use super::slats::LatticeIndex;

/// A scored handle assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique identifier within a run.
    pub id: u64,
    /// Generation the assignment was created in.
    pub generation: usize,
    /// Candidate this one was mutated from.
    pub parent: Option<u64>,
    pub assignment: HandleAssignment,
    pub score: ScoreSummary,
}

impl Candidate {
    #[inline]
    pub fn worst_score(&self) -> u32 {
        self.score.worst_score
    }

    #[inline]
    pub fn aggregate_score(&self) -> f64 {
        self.score.aggregate_score
    }
}

/// Failure of one scoring task.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("Candidate {index}: {source}")]
    Shape {
        index: usize,
        #[source]
        source: ShapeMismatchError,
    },
    #[error("Scoring worker for candidate {index} panicked: {message}")]
    WorkerPanicked { index: usize, message: String },
    #[error("Failed to start scoring pool: {0}")]
    PoolUnavailable(String),
}

/// Every task failure of one generation, raised together.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{} scoring task(s) failed in generation {}", .errors.len(), .generation)]
pub struct ScoringFailure {
    pub generation: usize,
    pub errors: Vec<ScoringError>,
}

/// Scores assignments against one lattice.
///
/// Holds the lattice index and the precomputed eligible pair lists so that
/// scoring an assignment only projects handles and runs the kernel.
#[derive(Debug, Clone)]
pub struct MatchScorer {
    index: Arc<LatticeIndex>,
    config: ScoringConfig,
    shape: (usize, usize, usize),
    /// Eligible (handle, antihandle) vector index pairs.
    pairs: Vec<(usize, usize)>,
    /// Eligible same-face vector index pairs, `i < j`.
    same_face_pairs: Vec<(usize, usize)>,
}

impl MatchScorer {
    /// Index the lattice and precompute eligible pairs.
    pub fn new(lattice: &Lattice, config: ScoringConfig) -> Self {
        let index = Arc::new(LatticeIndex::build(lattice));
        Self::with_index(index, lattice.assignment_shape(), config)
    }

    /// Reuse an existing lattice index.
    pub fn with_index(
        index: Arc<LatticeIndex>,
        shape: (usize, usize, usize),
        config: ScoringConfig,
    ) -> Self {
        let eligible = Eligibility::new(&config.eligibility);

        let handles: Vec<usize> = index.vectors_with_face(Face::Handle).collect();
        let antihandles: Vec<usize> = index.vectors_with_face(Face::Antihandle).collect();

        let mut pairs = Vec::with_capacity(handles.len() * antihandles.len());
        for &h in &handles {
            for &a in &antihandles {
                if eligible.allows(&index, h, a) {
                    pairs.push((h, a));
                }
            }
        }

        let mut same_face_pairs = Vec::new();
        if config.substitution_risk {
            for group in [&handles, &antihandles] {
                for (n, &i) in group.iter().enumerate() {
                    for &j in &group[n + 1..] {
                        if eligible.allows(&index, i, j) {
                            same_face_pairs.push((i, j));
                        }
                    }
                }
            }
        }

        log::debug!(
            "Scorer ready: {} cross pairs, {} substitution pairs",
            pairs.len(),
            same_face_pairs.len()
        );

        Self {
            index,
            config,
            shape,
            pairs,
            same_face_pairs,
        }
    }

    pub fn index(&self) -> &Arc<LatticeIndex> {
        &self.index
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Number of eligible cross pairs scored per assignment.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    fn skip_linear_off_axis(&self) -> bool {
        self.config.rotation_mode == RotationMode::SkipOffAxisForLinear
    }

    /// Score one assignment.
    pub fn score(&self, assignment: &HandleAssignment) -> Result<ScoreSummary, ShapeMismatchError> {
        if assignment.dims() != self.shape {
            return Err(ShapeMismatchError {
                expected: self.shape,
                found: assignment.dims(),
            });
        }

        let projected: Vec<ProjectedVector<'_>> = (0..self.index.vectors().len())
            .map(|v| self.index.project(v, assignment))
            .collect();
        let skip = self.skip_linear_off_axis();

        let max_mismatch = self.index.max_length();
        let mut histogram = Histogram::new(max_mismatch);
        let pair_scores: Vec<u32> = self
            .pairs
            .iter()
            .map(|&(h, a)| match_vectors(&projected[h], &projected[a], skip).pair_score())
            .collect();
        for &s in &pair_scores {
            histogram.record(s);
        }

        let worst = histogram.worst();
        let worst_ledger = match worst {
            Some(w) => self
                .pairs
                .iter()
                .zip(&pair_scores)
                .filter(|&(_, &s)| s == w)
                .map(|(&(h, a), _)| LedgerEntry {
                    handle: self.index.vectors()[h].key,
                    antihandle: self.index.vectors()[a].key,
                })
                .collect(),
            None => Vec::new(),
        };

        let substitution_risk = if self.config.substitution_risk {
            self.same_face_pairs
                .iter()
                .map(|&(i, j)| match_vectors(&projected[i], &projected[j], skip).pair_score())
                .min()
        } else {
            None
        };

        Ok(ScoreSummary {
            aggregate_score: histogram.aggregate(self.config.weighting),
            worst_score: worst.unwrap_or(max_mismatch),
            histogram,
            worst_ledger,
            substitution_risk,
        })
    }

    /// Full alignment record for one ledger pair.
    pub fn match_record(
        &self,
        entry: &LedgerEntry,
        assignment: &HandleAssignment,
    ) -> Option<MatchRecord> {
        let h = self.index.vector_index(&entry.handle)?;
        let a = self.index.vector_index(&entry.antihandle)?;
        Some(match_vectors(
            &self.index.project(h, assignment),
            &self.index.project(a, assignment),
            self.skip_linear_off_axis(),
        ))
    }
}

/// Score a single assignment from scratch.
pub fn score_assignment(
    lattice: &Lattice,
    assignment: &HandleAssignment,
    config: &ScoringConfig,
) -> Result<Candidate, ShapeMismatchError> {
    lattice.check_shape(assignment)?;
    let score = MatchScorer::new(lattice, config.clone()).score(assignment)?;
    Ok(Candidate {
        id: 0,
        generation: 0,
        parent: None,
        assignment: assignment.clone(),
        score,
    })
}

enum Eligibility {
    Universal,
    PerLayer,
    Grouped(HashMap<ComponentKey, Vec<usize>>),
}

impl Eligibility {
    fn new(mode: &EligibilityMode) -> Self {
        match mode {
            EligibilityMode::Universal => Self::Universal,
            EligibilityMode::PerLayer => Self::PerLayer,
            EligibilityMode::Grouped { groups } => {
                let mut membership: HashMap<ComponentKey, Vec<usize>> = HashMap::new();
                for (g, members) in groups.iter().enumerate() {
                    for key in members {
                        membership.entry(*key).or_default().push(g);
                    }
                }
                Self::Grouped(membership)
            }
        }
    }

    fn allows(&self, index: &LatticeIndex, i: usize, j: usize) -> bool {
        let (vi, vj) = (&index.vectors()[i].key, &index.vectors()[j].key);
        match self {
            Self::Universal => true,
            Self::PerLayer => vi.interface == vj.interface,
            Self::Grouped(membership) => {
                match (membership.get(&vi.component), membership.get(&vj.component)) {
                    (Some(gi), Some(gj)) => gi.iter().any(|g| gj.contains(g)),
                    _ => false,
                }
            }
        }
    }
}
