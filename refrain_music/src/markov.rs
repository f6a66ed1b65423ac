// First-order Markov transition matrix learned from a corpus.
//
// For every distinct state in the corpus, counts the states that follow it
// and stores them as (candidate, cumulative probability) pairs. Candidates
// are kept in their natural order (BTreeMap), so a seeded walk replays
// identically; cumulative values are computed from running counts, so the
// last entry of every list is exactly 1.0.
//
// A state that never has a successor (it occurs only as the corpus's final
// element) gets a single fallback candidate drawn at random from the rest of
// the corpus. This is the one place where building the matrix consumes
// randomness; every key must stay walkable.
//
// The matrix is generic over the state type: melodies use `Unit`, grouped
// generation (generate.rs) keys it by whole runs of units.

use crate::error::ValidationError;
use refrain_prng::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// How the fallback successor of a dead-end state is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackChoice {
    /// Uniform over corpus occurrences other than the dead end, so frequent
    /// states are proportionally likelier.
    #[default]
    Weighted,
    /// Uniform over the distinct states other than the dead end.
    Uniform,
}

/// State → ordered successor candidates with cumulative probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix<T> {
    table: BTreeMap<T, Vec<(T, f64)>>,
}

impl<T: Ord + Clone> TransitionMatrix<T> {
    /// Learn the matrix from `corpus`.
    ///
    /// Fails with `EmptyCorpus` before drawing anything if the corpus is
    /// empty.
    pub fn build(
        corpus: &[T],
        fallback: FallbackChoice,
        rng: &mut impl RandomSource,
    ) -> Result<Self, ValidationError> {
        if corpus.is_empty() {
            return Err(ValidationError::EmptyCorpus);
        }

        let mut counts: BTreeMap<&T, BTreeMap<&T, u32>> = BTreeMap::new();
        for state in corpus {
            counts.entry(state).or_default();
        }
        for pair in corpus.windows(2) {
            *counts.entry(&pair[0]).or_default().entry(&pair[1]).or_default() += 1;
        }

        let distinct: Vec<&T> = counts.keys().copied().collect();
        let mut table = BTreeMap::new();
        let mut dead_ends = 0usize;
        for (state, successors) in counts {
            let candidates = if successors.is_empty() {
                dead_ends += 1;
                let target = fallback_successor(state, corpus, &distinct, fallback, rng);
                vec![(target, 1.0)]
            } else {
                cumulative(&successors)
            };
            table.insert(state.clone(), candidates);
        }

        debug!(
            states = table.len(),
            corpus_len = corpus.len(),
            dead_ends,
            "built transition matrix"
        );
        Ok(TransitionMatrix { table })
    }

    /// Assemble a matrix from precomputed entries. No invariants are checked;
    /// the walker copes with empty candidate lists on its own.
    pub fn from_entries(entries: impl IntoIterator<Item = (T, Vec<(T, f64)>)>) -> Self {
        TransitionMatrix {
            table: entries.into_iter().collect(),
        }
    }

    /// Candidates for `state` in stored order, or `None` if it is not a key.
    pub fn candidates(&self, state: &T) -> Option<&[(T, f64)]> {
        self.table.get(state).map(Vec::as_slice)
    }

    pub fn contains(&self, state: &T) -> bool {
        self.table.contains_key(state)
    }

    /// Whether `state` is a key with at least one candidate.
    pub fn is_walkable(&self, state: &T) -> bool {
        self.table.get(state).is_some_and(|c| !c.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &T> {
        self.table.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, &[(T, f64)])> {
        self.table.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The key with the longest candidate list. Ties go to the first key in
    /// order.
    pub fn richest_key(&self) -> Option<&T> {
        let mut best: Option<(&T, usize)> = None;
        for (key, candidates) in &self.table {
            if best.is_none_or(|(_, len)| candidates.len() > len) {
                best = Some((key, candidates.len()));
            }
        }
        best.map(|(key, _)| key)
    }

    /// Select the successor of `state` for a uniform draw `r` in [0, 1):
    /// the first candidate whose cumulative probability exceeds `r`. Falls
    /// back to the last candidate if rounding leaves none. `None` if the
    /// state has no candidates.
    pub fn sample(&self, state: &T, r: f64) -> Option<&T> {
        let candidates = self.table.get(state)?;
        candidates
            .iter()
            .find(|(_, cumulative)| r < *cumulative)
            .or_else(|| candidates.last())
            .map(|(candidate, _)| candidate)
    }
}

/// Convert successor counts (already in candidate order) to cumulative
/// probabilities.
fn cumulative<T: Clone>(successors: &BTreeMap<&T, u32>) -> Vec<(T, f64)> {
    let total: u32 = successors.values().sum();
    let mut running = 0u32;
    successors
        .iter()
        .map(|(&candidate, &count)| {
            running += count;
            (candidate.clone(), f64::from(running) / f64::from(total))
        })
        .collect()
}

/// Draw the successor for a state that was never followed by anything.
/// A corpus with a single distinct state yields a self-loop.
fn fallback_successor<T: Ord + Clone>(
    state: &T,
    corpus: &[T],
    distinct: &[&T],
    fallback: FallbackChoice,
    rng: &mut impl RandomSource,
) -> T {
    let others: Vec<&T> = match fallback {
        FallbackChoice::Weighted => corpus.iter().filter(|s| *s != state).collect(),
        FallbackChoice::Uniform => distinct.iter().copied().filter(|s| *s != state).collect(),
    };
    rng.choose(&others)
        .map(|s| (*s).clone())
        .unwrap_or_else(|| state.clone())
}
