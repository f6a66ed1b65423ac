// Structure-aware composition over one shared Markov walk.
//
// `StructureComposer` turns a corpus and a `SectionPlan` into a flat unit
// sequence. It builds exactly one walker sized to the plan's total length and
// pulls from it across every segment: each section maps its pulls into its
// own letter, each transition blends its pulls between the neighbouring
// letters. Because the walker is shared, the Markov trajectory runs
// continuously across section boundaries instead of restarting per section.
//
// Every precondition (plan invariants, shaping parameters, non-empty corpus)
// is checked before the first random draw. A lookup failure mid-way aborts
// the whole call; no partial sequence is returned.

use crate::error::{ComposeError, LookupError};
use crate::sections::{SectionMap, SectionPlan, Segment, TransitionBlender};
use crate::shaping::{ChordDensifier, Shaping, SparsityShaper};
use crate::unit::Unit;
use crate::walker::{SequenceWalker, WalkOptions};
use refrain_prng::RandomSource;
use tracing::debug;

/// Composes corpora against a fixed plan and shaping policy.
#[derive(Debug, Clone)]
pub struct StructureComposer<'p> {
    plan: &'p SectionPlan,
    shaping: Shaping,
    options: WalkOptions,
}

impl<'p> StructureComposer<'p> {
    pub fn new(
        plan: &'p SectionPlan,
        shaping: Shaping,
        options: WalkOptions,
    ) -> Result<Self, ComposeError> {
        shaping.validate()?;
        options.validate()?;
        Ok(StructureComposer {
            plan,
            shaping,
            options,
        })
    }

    pub fn total_length(&self) -> usize {
        self.plan.total_length()
    }

    /// Generate one sequence of exactly `total_length` units.
    pub fn compose(
        &self,
        corpus: &[Unit],
        rng: &mut impl RandomSource,
    ) -> Result<Vec<Unit>, ComposeError> {
        let total = self.plan.total_length();
        let map = self.plan.map();
        let mut walker = SequenceWalker::from_corpus(corpus, total, &self.options, rng)?;
        let mut finisher = Finisher::new(&self.shaping, total)?;
        let mut out = Vec::with_capacity(total);

        for segment in self.plan.segments() {
            match segment {
                Segment::Section { letter, length } => {
                    let note_set = section_units(map, letter)?;
                    for _ in 0..length {
                        let unit = walker.advance(rng);
                        let mapped = map.map_unit(&unit, letter)?.clone();
                        out.push(finisher.finish(out.len(), mapped, note_set, rng));
                    }
                }
                Segment::Transition { from, to, length } => {
                    let note_set = [section_units(map, from)?, section_units(map, to)?].concat();
                    let mut blender = TransitionBlender::new(from, to, length);
                    for _ in 0..length {
                        let unit = walker.advance(rng);
                        let mapped = blender.blend(&unit, map, rng)?.clone();
                        out.push(finisher.finish(out.len(), mapped, &note_set, rng));
                    }
                }
            }
        }

        debug!(
            structure = %self.plan.structure_string(),
            units = out.len(),
            "composed sequence"
        );
        Ok(out)
    }
}

fn section_units(map: &SectionMap, letter: char) -> Result<&[Unit], LookupError> {
    map.section(letter).ok_or(LookupError::UnknownSection(letter))
}

/// Per-slot post-processing state for one composition call.
enum Finisher {
    Plain,
    Chords(ChordDensifier),
    Sparse(SparsityShaper),
}

impl Finisher {
    fn new(shaping: &Shaping, total: usize) -> Result<Self, ComposeError> {
        Ok(match shaping {
            Shaping::Plain => Finisher::Plain,
            Shaping::Chords { chord_increase } => {
                Finisher::Chords(ChordDensifier::new(*chord_increase, total)?)
            }
            Shaping::Sparse { ramp, pause } => {
                Finisher::Sparse(SparsityShaper::new(*ramp, pause.clone(), total))
            }
        })
    }

    fn finish(
        &mut self,
        index: usize,
        unit: Unit,
        note_set: &[Unit],
        rng: &mut impl RandomSource,
    ) -> Unit {
        match self {
            Finisher::Plain => unit,
            Finisher::Chords(densifier) => densifier.densify(unit, note_set, rng),
            Finisher::Sparse(shaper) => shaper.shape(index, unit, rng),
        }
    }
}
