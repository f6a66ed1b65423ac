// Post-processing policies applied to generated units.
//
// - `ChordDensifier` grows units into chords. Its probability starts at 0
//   and climbs by 1/total_length per emitted unit, so chords thicken towards
//   the end of a piece. Each unit gets up to `chord_increase` Bernoulli
//   trials; every success appends the root of a note-set member whose root
//   is not already in the chord.
// - `SparsityShaper` replaces units with a pause sentinel along a linear
//   ramp: emerging from silence (p = i/N) or fading into it (p = 1 - i/N).
//
// `Shaping` selects between these (or neither) for the composer. The plain
// generators in generate.rs drive the two policies directly.

use crate::error::ValidationError;
use crate::unit::Unit;
use refrain_prng::RandomSource;
use serde::{Deserialize, Serialize};

/// MIDI note used as the pause sentinel unless configured otherwise. Note 5
/// is far below any instrument range, so notation software can turn it into
/// rests.
pub const DEFAULT_PAUSE_NOTE: u8 = 5;

/// Direction of the sparsity ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ramp {
    /// Mostly pauses early, mostly notes late.
    #[default]
    Emerging,
    /// Mostly notes early, mostly pauses late.
    Fading,
}

/// Post-processing applied by the composer to each output slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Shaping {
    #[default]
    Plain,
    Chords {
        chord_increase: usize,
    },
    Sparse {
        ramp: Ramp,
        pause: Unit,
    },
}

impl Shaping {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Shaping::Chords { chord_increase: 0 } => Err(ValidationError::ZeroChordIncrease),
            _ => Ok(()),
        }
    }
}

/// Probabilistic chord growth with a rising probability.
#[derive(Debug, Clone)]
pub struct ChordDensifier {
    chord_increase: usize,
    probability: f64,
    step: f64,
}

impl ChordDensifier {
    pub fn new(chord_increase: usize, total_length: usize) -> Result<Self, ValidationError> {
        if chord_increase == 0 {
            return Err(ValidationError::ZeroChordIncrease);
        }
        Ok(ChordDensifier {
            chord_increase,
            probability: 0.0,
            step: if total_length == 0 {
                0.0
            } else {
                1.0 / total_length as f64
            },
        })
    }

    /// Grow `unit` from `note_set`, then advance the probability.
    pub fn densify(
        &mut self,
        unit: Unit,
        note_set: &[Unit],
        rng: &mut impl RandomSource,
    ) -> Unit {
        let mut chord = unit;
        for _ in 0..self.chord_increase {
            if rng.next_f64() < self.probability {
                let eligible: Vec<&Unit> = note_set
                    .iter()
                    .filter(|candidate| !chord.contains(candidate.root()))
                    .collect();
                if let Some(pick) = rng.choose(&eligible) {
                    chord = chord.with_note(pick.root());
                }
            }
        }
        self.probability += self.step;
        chord
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

/// Linear-ramp replacement of units with a pause sentinel.
#[derive(Debug, Clone)]
pub struct SparsityShaper {
    ramp: Ramp,
    pause: Unit,
    length: usize,
}

impl SparsityShaper {
    pub fn new(ramp: Ramp, pause: Unit, length: usize) -> Self {
        SparsityShaper {
            ramp,
            pause,
            length,
        }
    }

    /// Chance that slot `index` carries a real unit.
    pub fn probability_at(&self, index: usize) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        let progress = index as f64 / self.length as f64;
        match self.ramp {
            Ramp::Emerging => progress,
            Ramp::Fading => 1.0 - progress,
        }
    }

    /// Draw whether slot `index` is sounded.
    pub fn admits(&self, index: usize, rng: &mut impl RandomSource) -> bool {
        rng.next_f64() < self.probability_at(index)
    }

    /// Keep `unit` at slot `index` or replace it with the pause.
    pub fn shape(&self, index: usize, unit: Unit, rng: &mut impl RandomSource) -> Unit {
        if self.admits(index, rng) {
            unit
        } else {
            self.pause.clone()
        }
    }

    /// Fill `length` slots, pulling a real unit only for admitted slots, so
    /// the source advances one step per sounded note.
    pub fn shape_stream<R: RandomSource>(
        &self,
        rng: &mut R,
        mut pull: impl FnMut(&mut R) -> Option<Unit>,
    ) -> Vec<Unit> {
        (0..self.length)
            .map(|index| {
                let unit = if self.admits(index, rng) {
                    pull(rng)
                } else {
                    None
                };
                unit.unwrap_or_else(|| self.pause.clone())
            })
            .collect()
    }

    pub fn pause(&self) -> &Unit {
        &self.pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::notes;
    use refrain_prng::RefrainRng;

    #[test]
    fn test_zero_chord_increase_rejected() {
        assert_eq!(ChordDensifier::new(0, 10).err(), Some(ValidationError::ZeroChordIncrease));
        assert_eq!(
            Shaping::Chords { chord_increase: 0 }.validate(),
            Err(ValidationError::ZeroChordIncrease)
        );
        assert!(Shaping::Plain.validate().is_ok());
    }

    #[test]
    fn test_first_unit_is_never_grown() {
        let mut densifier = ChordDensifier::new(3, 10).unwrap();
        let mut rng = RefrainRng::new(1);
        let out = densifier.densify(Unit::note(60), &notes(&[62, 64, 65]), &mut rng);
        assert_eq!(out, Unit::note(60));
        assert!((densifier.probability() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_arity_bounded_by_chord_increase() {
        let note_set = notes(&[60, 62, 64, 65, 67, 69, 71, 72]);
        for chord_increase in 1..4 {
            let mut rng = RefrainRng::new(chord_increase as u64);
            let total = 50;
            let mut densifier = ChordDensifier::new(chord_increase, total).unwrap();
            for i in 0..total {
                let base = note_set[i % note_set.len()].clone();
                let grown = densifier.densify(base.clone(), &note_set, &mut rng);
                assert!(grown.arity() <= base.arity() + chord_increase);
                assert_eq!(grown.root(), base.root());
                let mut sorted = grown.notes().to_vec();
                sorted.sort_unstable();
                sorted.dedup();
                assert_eq!(sorted.len(), grown.arity(), "duplicate note in {grown}");
            }
        }
    }

    #[test]
    fn test_exhausted_note_set_is_noop() {
        let mut densifier = ChordDensifier::new(2, 1).unwrap();
        // Force probability to 1 for the second unit.
        let mut rng = RefrainRng::new(0);
        densifier.densify(Unit::note(60), &[], &mut rng);
        let out = densifier.densify(Unit::note(60), &notes(&[60]), &mut rng);
        assert_eq!(out, Unit::note(60));
    }

    #[test]
    fn test_late_units_grow() {
        let note_set = notes(&[60, 64, 67]);
        let mut rng = RefrainRng::new(4);
        let mut densifier = ChordDensifier::new(1, 1).unwrap();
        densifier.densify(Unit::note(60), &note_set, &mut rng);
        // Probability is now 1.0: exactly one of 64/67 must be added.
        let out = densifier.densify(Unit::note(60), &note_set, &mut rng);
        assert_eq!(out.arity(), 2);
        assert!(out.contains(64) || out.contains(67));
    }

    #[test]
    fn test_ramp_probabilities() {
        let pause = Unit::note(DEFAULT_PAUSE_NOTE);
        let emerging = SparsityShaper::new(Ramp::Emerging, pause.clone(), 4);
        assert_eq!(emerging.probability_at(0), 0.0);
        assert_eq!(emerging.probability_at(2), 0.5);
        let fading = SparsityShaper::new(Ramp::Fading, pause, 4);
        assert_eq!(fading.probability_at(0), 1.0);
        assert_eq!(fading.probability_at(3), 0.25);
    }

    #[test]
    fn test_emerging_starts_silent() {
        let pause = Unit::note(DEFAULT_PAUSE_NOTE);
        let shaper = SparsityShaper::new(Ramp::Emerging, pause.clone(), 20);
        let mut rng = RefrainRng::new(12);
        let mut pulled = 0;
        let out = shaper.shape_stream(&mut rng, |_| {
            pulled += 1;
            Some(Unit::note(60))
        });
        assert_eq!(out.len(), 20);
        assert_eq!(out[0], pause);
        let sounded = out.iter().filter(|u| **u != pause).count();
        assert_eq!(sounded, pulled);
    }

    #[test]
    fn test_fading_ends_mostly_silent() {
        let pause = Unit::note(DEFAULT_PAUSE_NOTE);
        let n = 100;
        let shaper = SparsityShaper::new(Ramp::Fading, pause.clone(), n);
        let mut rng = RefrainRng::new(21);
        let mut early = 0;
        let mut late = 0;
        for _ in 0..50 {
            let out = shaper.shape_stream(&mut rng, |_| Some(Unit::note(60)));
            early += out[..10].iter().filter(|u| **u != pause).count();
            late += out[n - 10..].iter().filter(|u| **u != pause).count();
        }
        assert!(early > late * 5, "early {early} vs late {late}");
    }
}
