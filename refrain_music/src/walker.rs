// Pull-based random walk over a transition matrix.
//
// `SequenceWalker` is an explicit cursor: it owns the matrix, the current
// state, and how many pulls remain. Each pull draws once from the caller's
// random source and advances along the matrix. The walker never owns the
// random source, because the composer interleaves walker draws with blending
// and shaping draws on the same stream (compose.rs).
//
// The walk starts from a state drawn from the corpus; that seed state is
// not itself emitted. A walk is single-use: consuming it moves the cursor,
// and a fresh walk needs a fresh walker.
//
// Repetition control: with a cap of N, once the same state has been emitted
// N times in a row the next pull excludes it, choosing uniformly among the
// other candidates. Plain walks cap at 3; composed walks run uncapped unless
// configured otherwise (config.rs).

use crate::error::ValidationError;
use crate::markov::{FallbackChoice, TransitionMatrix};
use refrain_prng::RandomSource;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Longest run of one state a capped walk may emit.
pub const DEFAULT_REPETITION_CAP: usize = 3;

/// Knobs shared by every walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkOptions {
    /// Maximum consecutive emissions of one state; `None` disables the check.
    /// Must be at least 1 when set.
    pub repetition_cap: Option<usize>,
    /// How dead-end states are patched when the matrix is built.
    pub fallback: FallbackChoice,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            repetition_cap: Some(DEFAULT_REPETITION_CAP),
            fallback: FallbackChoice::default(),
        }
    }
}

impl WalkOptions {
    /// Same options with repetition control switched off.
    pub fn uncapped(self) -> Self {
        WalkOptions {
            repetition_cap: None,
            ..self
        }
    }

    /// A cap of zero would force every draw off the matrix.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.repetition_cap == Some(0) {
            return Err(ValidationError::ZeroRepetitionCap);
        }
        Ok(())
    }
}

/// Stateful cursor producing exactly `length` states.
#[derive(Debug, Clone)]
pub struct SequenceWalker<T> {
    matrix: TransitionMatrix<T>,
    current: T,
    remaining: usize,
    repetition_cap: Option<usize>,
    /// Consecutive emissions of `current`. Zero until the first pull.
    run_length: usize,
}

impl<T: Ord + Clone> SequenceWalker<T> {
    pub fn new(
        matrix: TransitionMatrix<T>,
        start: T,
        length: usize,
        repetition_cap: Option<usize>,
    ) -> Self {
        debug_assert_ne!(repetition_cap, Some(0), "repetition cap must be at least 1");
        SequenceWalker {
            matrix,
            current: start,
            remaining: length,
            repetition_cap,
            run_length: 0,
        }
    }

    /// Learn a matrix from `corpus` and start the walk from a random corpus
    /// element.
    pub fn from_corpus(
        corpus: &[T],
        length: usize,
        options: &WalkOptions,
        rng: &mut impl RandomSource,
    ) -> Result<Self, ValidationError> {
        options.validate()?;
        let matrix = TransitionMatrix::build(corpus, options.fallback, rng)?;
        let start = rng.choose(corpus).cloned().ok_or(ValidationError::EmptyCorpus)?;
        Ok(Self::new(matrix, start, length, options.repetition_cap))
    }

    /// Pull the next state, or `None` once `length` states have been pulled.
    pub fn next_unit(&mut self, rng: &mut impl RandomSource) -> Option<T> {
        if self.remaining == 0 {
            return None;
        }
        Some(self.advance(rng))
    }

    /// Borrow the walker and a random source as an iterator over the
    /// remaining states.
    pub fn walk<'a, R: RandomSource>(&'a mut self, rng: &'a mut R) -> Walk<'a, T, R> {
        Walk { walker: self, rng }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn matrix(&self) -> &TransitionMatrix<T> {
        &self.matrix
    }

    /// One step of the walk, ignoring the length bound. The composer sizes
    /// the walker to its total length and pulls through this directly.
    pub(crate) fn advance(&mut self, rng: &mut impl RandomSource) -> T {
        self.remaining = self.remaining.saturating_sub(1);

        if !self.matrix.is_walkable(&self.current) {
            if let Some(richest) = self.matrix.richest_key() {
                warn!("walker reached a state with no successors; redirecting to the richest state");
                self.current = richest.clone();
                self.run_length = 0;
            }
        }

        let capped = self
            .repetition_cap
            .is_some_and(|cap| self.run_length >= cap);
        let next = if capped {
            self.draw_excluding_current(rng)
        } else {
            let r = rng.next_f64();
            self.matrix
                .sample(&self.current, r)
                .cloned()
                .unwrap_or_else(|| self.current.clone())
        };

        if self.run_length > 0 && next == self.current {
            self.run_length += 1;
        } else {
            self.run_length = 1;
        }
        self.current = next.clone();
        next
    }

    /// Uniform draw among the current state's candidates other than itself.
    /// With none left, jump to any other key; a one-key matrix repeats.
    fn draw_excluding_current(&self, rng: &mut impl RandomSource) -> T {
        let others: Vec<&T> = self
            .matrix
            .candidates(&self.current)
            .unwrap_or_default()
            .iter()
            .map(|(candidate, _)| candidate)
            .filter(|candidate| **candidate != self.current)
            .collect();
        if let Some(pick) = rng.choose(&others) {
            return (*pick).clone();
        }
        let keys: Vec<&T> = self.matrix.keys().filter(|k| **k != self.current).collect();
        rng.choose(&keys)
            .map(|k| (*k).clone())
            .unwrap_or_else(|| self.current.clone())
    }
}

/// Iterator view of a walker bound to a random source.
pub struct Walk<'a, T, R> {
    walker: &'a mut SequenceWalker<T>,
    rng: &'a mut R,
}

impl<T: Ord + Clone, R: RandomSource> Iterator for Walk<'_, T, R> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.walker.next_unit(self.rng)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.walker.remaining, Some(self.walker.remaining))
    }
}

impl<T: Ord + Clone, R: RandomSource> ExactSizeIterator for Walk<'_, T, R> {}
