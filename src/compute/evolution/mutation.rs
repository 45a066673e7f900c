//! Mutation engine for handle assignments.
//!
//! Provides random initialization, policy selection and masked mutation.
//! Mutation is copy-on-write: the parent assignment is never touched.

use std::ops::RangeInclusive;
use std::sync::Arc;

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::LatticeIndex;
use crate::schema::{
    ConfigError, EvolutionConfig, HandleAssignment, Lattice, LedgerEntry, MutationMask,
    MutationTypeProbabilities, VectorKey,
};

/// Which positions a mutation event may rewrite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MutationPolicy {
    /// Handle side of the parent's worst ledger.
    HandlesOnly,
    /// Antihandle side of the parent's worst ledger.
    AntihandlesOnly,
    /// Any structurally valid position.
    Anywhere,
}

impl MutationPolicy {
    const ALL: [MutationPolicy; 3] = [Self::HandlesOnly, Self::AntihandlesOnly, Self::Anywhere];
}

/// Identifiers a position may be assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleAlphabet {
    size: u16,
    split: bool,
}

impl HandleAlphabet {
    /// Every interface draws from `1..=size`.
    pub fn full(size: u16) -> Self {
        Self { size, split: false }
    }

    /// Even interfaces draw from the lower half, odd interfaces from the upper half.
    pub fn split(size: u16) -> Self {
        Self { size, split: true }
    }

    pub fn from_config(config: &EvolutionConfig) -> Self {
        if config.split_sequence_handles {
            Self::split(config.unique_handle_sequences)
        } else {
            Self::full(config.unique_handle_sequences)
        }
    }

    #[inline]
    pub fn size(&self) -> u16 {
        self.size
    }

    /// Identifiers available at `interface`.
    pub fn range(&self, interface: usize) -> RangeInclusive<u16> {
        if !self.split {
            return 1..=self.size;
        }
        let half = self.size / 2;
        if interface % 2 == 0 {
            1..=half
        } else {
            half + 1..=self.size
        }
    }
}

/// Random number generator wrapper for assignment operations.
pub struct HandleRng {
    rng: StdRng,
}

impl HandleRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Fill every position of `mask` with a fresh identifier.
    pub fn random_assignment(
        &mut self,
        template: HandleAssignment,
        mask: &MutationMask,
        alphabet: HandleAlphabet,
    ) -> HandleAssignment {
        let mut assignment = template;
        for (x, y, i) in mask.selected() {
            assignment.set(x, y, i, self.draw(alphabet, i));
        }
        assignment
    }

    /// Uniform index in `0..n`.
    pub fn choose_index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }

    fn draw(&mut self, alphabet: HandleAlphabet, interface: usize) -> u16 {
        self.rng.gen_range(alphabet.range(interface))
    }

    /// Rewrite each selected position with probability `rate`.
    pub fn mutate_masked(
        &mut self,
        parent: &HandleAssignment,
        mask: &MutationMask,
        rate: f64,
        alphabet: HandleAlphabet,
    ) -> HandleAssignment {
        let mut child = parent.clone();
        for (x, y, i) in mask.selected() {
            if self.rng.r#gen::<f64>() < rate {
                child.set(x, y, i, self.draw(alphabet, i));
            }
        }
        child
    }
}

/// Builds children from survivors.
///
/// Owns the validity mask so every policy mask can be intersected with it.
#[derive(Debug, Clone)]
pub struct Mutator {
    index: Arc<LatticeIndex>,
    validity: MutationMask,
    template: HandleAssignment,
    rate: f64,
    alphabet: HandleAlphabet,
    policies: WeightedIndex<f64>,
}

impl Mutator {
    pub fn new(
        lattice: &Lattice,
        index: Arc<LatticeIndex>,
        config: &EvolutionConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            index,
            validity: lattice.validity_mask(),
            template: HandleAssignment::empty_for(lattice),
            rate: config.mutation_rate,
            alphabet: HandleAlphabet::from_config(config),
            policies: policy_distribution(&config.mutation_type_probabilities)?,
        })
    }

    pub fn validity(&self) -> &MutationMask {
        &self.validity
    }

    pub fn alphabet(&self) -> HandleAlphabet {
        self.alphabet
    }

    /// Fresh random assignment covering every valid position.
    pub fn random_assignment(&self, rng: &mut HandleRng) -> HandleAssignment {
        rng.random_assignment(self.template.clone(), &self.validity, self.alphabet)
    }

    pub fn choose_policy(&self, rng: &mut HandleRng) -> MutationPolicy {
        MutationPolicy::ALL[self.policies.sample(&mut rng.rng)]
    }

    /// Positions eligible under `policy`, always within the validity mask.
    ///
    /// `remembered` entries extend the targeted masks. A targeted mask that
    /// ends up empty falls back to the validity mask.
    pub fn policy_mask(
        &self,
        policy: MutationPolicy,
        ledger: &[LedgerEntry],
        remembered: &[LedgerEntry],
    ) -> MutationMask {
        let side: fn(&LedgerEntry) -> VectorKey = match policy {
            MutationPolicy::Anywhere => return self.validity.clone(),
            MutationPolicy::HandlesOnly => |e: &LedgerEntry| e.handle,
            MutationPolicy::AntihandlesOnly => |e: &LedgerEntry| e.antihandle,
        };

        let mut mask = self.validity.empty_like();
        for entry in ledger.iter().chain(remembered) {
            for (x, y, i) in self.index.vector_positions(&side(entry)) {
                mask.set(x, y, i, true);
            }
        }
        mask.intersect(&self.validity);

        if mask.count() == 0 {
            log::debug!("{policy:?} mask empty, mutating anywhere");
            return self.validity.clone();
        }
        mask
    }

    /// Produce one child from `parent` and its worst ledger.
    pub fn mutate(
        &self,
        rng: &mut HandleRng,
        parent: &HandleAssignment,
        ledger: &[LedgerEntry],
        policy: MutationPolicy,
        remembered: &[LedgerEntry],
    ) -> HandleAssignment {
        let mask = self.policy_mask(policy, ledger, remembered);
        rng.mutate_masked(parent, &mask, self.rate, self.alphabet)
    }
}

fn policy_distribution(
    probabilities: &MutationTypeProbabilities,
) -> Result<WeightedIndex<f64>, ConfigError> {
    WeightedIndex::new(probabilities.weights())
        .map_err(|e| ConfigError::InvalidProbabilities(e.to_string()))
}
