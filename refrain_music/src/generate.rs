// Single-stream generators without a section plan.
//
// These are the plain counterparts of the composer: one walk over the
// corpus's own matrix, optionally thinned into pauses, grown into chords, or
// walked over grouped runs instead of single units. Repetition control is on
// by default here (`WalkOptions::default()`).

use crate::error::ValidationError;
use crate::grouping::{flatten, group_by_pauses, group_by_pitch, group_in_chunks, ordered_set};
use crate::shaping::{ChordDensifier, Ramp, SparsityShaper};
use crate::unit::Unit;
use crate::walker::{SequenceWalker, WalkOptions};
use refrain_prng::RandomSource;
use serde::{Deserialize, Serialize};

/// How a corpus is regrouped before walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    /// Runs of identical units.
    Pitch,
    /// Pause-led phrases.
    Pauses,
    /// Fixed-size chunks.
    Chunks(usize),
}

/// Walk `length` states of the corpus's matrix.
pub fn generate<T: Ord + Clone>(
    corpus: &[T],
    length: usize,
    options: &WalkOptions,
    rng: &mut impl RandomSource,
) -> Result<Vec<T>, ValidationError> {
    let mut walker = SequenceWalker::from_corpus(corpus, length, options, rng)?;
    Ok(walker.walk(rng).collect())
}

/// `length` slots along a pause ramp. The walk advances only on sounded
/// slots.
pub fn generate_sparse(
    corpus: &[Unit],
    length: usize,
    ramp: Ramp,
    pause: &Unit,
    options: &WalkOptions,
    rng: &mut impl RandomSource,
) -> Result<Vec<Unit>, ValidationError> {
    let mut walker = SequenceWalker::from_corpus(corpus, length, options, rng)?;
    let shaper = SparsityShaper::new(ramp, pause.clone(), length);
    Ok(shaper.shape_stream(rng, |rng| walker.next_unit(rng)))
}

/// A plain walk grown into chords from the corpus's distinct units.
pub fn generate_chorded(
    corpus: &[Unit],
    length: usize,
    chord_increase: usize,
    options: &WalkOptions,
    rng: &mut impl RandomSource,
) -> Result<Vec<Unit>, ValidationError> {
    let mut densifier = ChordDensifier::new(chord_increase, length)?;
    let mut walker = SequenceWalker::from_corpus(corpus, length, options, rng)?;
    let note_set = ordered_set(corpus);
    let mut out = Vec::with_capacity(length);
    while let Some(unit) = walker.next_unit(rng) {
        out.push(densifier.densify(unit, &note_set, rng));
    }
    Ok(out)
}

/// Walk `length` groups of the regrouped corpus and flatten the result.
/// The output length is the total size of the walked groups.
pub fn generate_grouped(
    corpus: &[Unit],
    length: usize,
    grouping: Grouping,
    pause: &Unit,
    options: &WalkOptions,
    rng: &mut impl RandomSource,
) -> Result<Vec<Unit>, ValidationError> {
    let groups = match grouping {
        Grouping::Pitch => group_by_pitch(corpus)?,
        Grouping::Pauses => group_by_pauses(corpus, pause)?,
        Grouping::Chunks(size) => group_in_chunks(corpus, size)?,
    };
    Ok(flatten(generate(&groups, length, options, rng)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaping::DEFAULT_PAUSE_NOTE;
    use crate::unit::notes;
    use refrain_prng::RefrainRng;

    fn corpus() -> Vec<Unit> {
        notes(&[60, 62, 64, 64, 62, 60, 67, 67, 67, 65, 64, 62])
    }

    #[test]
    fn test_generate_length() {
        let mut rng = RefrainRng::new(1);
        for n in [0, 1, 10, 257] {
            let out = generate(&corpus(), n, &WalkOptions::default(), &mut rng).unwrap();
            assert_eq!(out.len(), n);
        }
    }

    #[test]
    fn test_generate_only_emits_corpus_units() {
        let mut rng = RefrainRng::new(2);
        let corpus = corpus();
        let out = generate(&corpus, 100, &WalkOptions::default(), &mut rng).unwrap();
        assert!(out.iter().all(|u| corpus.contains(u)));
    }

    #[test]
    fn test_generate_sparse() {
        let pause = Unit::note(DEFAULT_PAUSE_NOTE);
        let mut rng = RefrainRng::new(3);
        let out = generate_sparse(
            &corpus(),
            40,
            Ramp::Emerging,
            &pause,
            &WalkOptions::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(out.len(), 40);
        assert_eq!(out[0], pause);
        assert!(out.iter().any(|u| *u != pause));
    }

    #[test]
    fn test_generate_chorded() {
        let mut rng = RefrainRng::new(4);
        let out = generate_chorded(&corpus(), 60, 2, &WalkOptions::default(), &mut rng).unwrap();
        assert_eq!(out.len(), 60);
        assert!(out.iter().all(|u| u.arity() <= 3));
        assert_eq!(out[0].arity(), 1);
    }

    #[test]
    fn test_chorded_rejects_zero_increase_before_drawing() {
        let mut rng = RefrainRng::new(4);
        let err = generate_chorded(&corpus(), 5, 0, &WalkOptions::default(), &mut rng);
        assert_eq!(err, Err(ValidationError::ZeroChordIncrease));
    }

    #[test]
    fn test_generate_grouped_by_pitch_keeps_runs() {
        let mut rng = RefrainRng::new(5);
        let corpus = corpus();
        let out = generate_grouped(
            &corpus,
            20,
            Grouping::Pitch,
            &Unit::note(DEFAULT_PAUSE_NOTE),
            &WalkOptions::default(),
            &mut rng,
        )
        .unwrap();
        // Every run in the output is made of whole corpus runs, so 67 only
        // ever appears in multiples of three.
        let runs = group_by_pitch(&out).unwrap();
        for run in runs.iter().filter(|r| r[0] == Unit::note(67)) {
            assert_eq!(run.len() % 3, 0);
        }
        assert!(out.len() >= 20);
    }

    #[test]
    fn test_generate_grouped_empty_corpus() {
        let mut rng = RefrainRng::new(6);
        let result = generate_grouped(
            &[],
            4,
            Grouping::Pauses,
            &Unit::note(DEFAULT_PAUSE_NOTE),
            &WalkOptions::default(),
            &mut rng,
        );
        assert_eq!(result, Err(ValidationError::EmptySequence));
    }
}
