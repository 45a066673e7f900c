//! Bounded memory of worst-offending pairs across recent generations.

use std::collections::{HashMap, VecDeque};

use crate::schema::{LedgerEntry, MemoryConfig};

/// Ring buffer of worst ledgers.
///
/// Holds at most `length × population` ledgers; the oldest are evicted first.
#[derive(Debug, Clone, Default)]
pub struct OffenderMemory {
    ledgers: VecDeque<Vec<LedgerEntry>>,
    capacity: usize,
    min_repeats: usize,
}

impl OffenderMemory {
    /// Create a new memory.
    pub fn new(config: &MemoryConfig, population: usize) -> Self {
        Self {
            ledgers: VecDeque::new(),
            capacity: config.length * population,
            min_repeats: config.min_repeats,
        }
    }

    /// Whether anything is ever remembered.
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Store one candidate's worst ledger.
    pub fn remember(&mut self, ledger: &[LedgerEntry]) {
        if !self.is_enabled() {
            return;
        }
        while self.ledgers.len() >= self.capacity {
            self.ledgers.pop_front();
        }
        self.ledgers.push_back(ledger.to_vec());
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pairs seen in at least `min_repeats` stored ledgers, sorted.
    pub fn recurring(&self) -> Vec<LedgerEntry> {
        let mut counts: HashMap<LedgerEntry, usize> = HashMap::new();
        for ledger in &self.ledgers {
            let mut seen = ledger.clone();
            seen.sort_unstable();
            seen.dedup();
            for entry in seen {
                *counts.entry(entry).or_default() += 1;
            }
        }
        let mut recurring: Vec<LedgerEntry> = counts
            .into_iter()
            .filter(|&(_, n)| n >= self.min_repeats)
            .map(|(entry, _)| entry)
            .collect();
        recurring.sort_unstable();
        recurring
    }

    pub fn clear(&mut self) {
        self.ledgers.clear();
    }
}
