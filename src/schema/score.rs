//! Score data produced by the match scoring engine.

use serde::{Deserialize, Serialize};

use super::{AggregateWeighting, ComponentKey};

/// One exposed handle or antihandle vector: a component at an interface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VectorKey {
    pub component: ComponentKey,
    pub interface: usize,
}

/// A worst-offending handle/antihandle pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LedgerEntry {
    /// Handle-bearing side.
    pub handle: VectorKey,
    /// Antihandle-bearing side.
    pub antihandle: VectorKey,
}

/// Pairs whose score equals the worst score of an assignment.
pub type WorstLedger = Vec<LedgerEntry>;

/// Pair counts per mismatch bucket `0..=L`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    counts: Vec<u64>,
}

impl Histogram {
    /// Empty histogram with buckets `0..=max_mismatch`.
    pub fn new(max_mismatch: u32) -> Self {
        Self {
            counts: vec![0; max_mismatch as usize + 1],
        }
    }

    /// Largest representable bucket.
    #[inline]
    pub fn max_mismatch(&self) -> u32 {
        (self.counts.len() - 1) as u32
    }

    /// Count one pair with the given score.
    #[inline]
    pub fn record(&mut self, mismatch: u32) {
        self.counts[mismatch as usize] += 1;
    }

    #[inline]
    pub fn count(&self, mismatch: u32) -> u64 {
        self.counts.get(mismatch as usize).copied().unwrap_or(0)
    }

    /// Total number of pairs recorded.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Lowest non-empty bucket.
    pub fn worst(&self) -> Option<u32> {
        self.counts.iter().position(|&c| c > 0).map(|b| b as u32)
    }

    /// Non-empty buckets as `(mismatch, count)`.
    pub fn nonzero(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(b, c)| (b as u32, *c))
    }

    /// Weighted sum favouring fewer low-mismatch pairs; lower is better.
    pub fn aggregate(&self, weighting: AggregateWeighting) -> f64 {
        let max = self.max_mismatch();
        match weighting {
            AggregateWeighting::Linear => self
                .nonzero()
                .map(|(b, c)| c as f64 * f64::from(max - b))
                .sum(),
            AggregateWeighting::Exponential { fudge } => {
                // log-sum-exp shifted by the largest exponent
                let Some(worst) = self.worst() else {
                    return 0.0;
                };
                let peak = fudge * f64::from(max - worst);
                let sum: f64 = self
                    .nonzero()
                    .map(|(b, c)| c as f64 * (fudge * f64::from(max - b) - peak).exp())
                    .sum();
                (peak + sum.ln()) / fudge
            }
        }
    }
}

/// Cached score of one handle assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Mismatch histogram over all eligible pairs.
    pub histogram: Histogram,
    /// Pairs responsible for the worst score.
    pub worst_ledger: WorstLedger,
    /// Lowest mismatch observed (higher is safer). Equals `L` when no pair was scored.
    pub worst_score: u32,
    /// Weighted histogram summary (lower is better).
    pub aggregate_score: f64,
    /// Lowest mismatch between two same-face vectors, if requested.
    pub substitution_risk: Option<u32>,
}

impl ScoreSummary {
    /// Ordering used for selection: higher worst score first, then lower aggregate.
    pub fn rank_cmp(&self, other: &ScoreSummary) -> std::cmp::Ordering {
        other
            .worst_score
            .cmp(&self.worst_score)
            .then(self.aggregate_score.total_cmp(&other.aggregate_score))
    }
}
