// Refrain: a sectional Markov note generator.
//
// A corpus of notes and chords trains a first-order transition matrix; a
// walker samples it into new sequences. A section plan (structure string,
// lengths, and a positional section map) turns one continuous walk into a
// piece with lettered sections and probabilistic blends between them, and
// optional shaping grows units into chords or thins them into pauses.
//
// Architecture:
// - unit.rs: `Unit`, an immutable note-or-chord tuple
// - markov.rs: transition matrix construction and cumulative sampling
// - walker.rs: `SequenceWalker`, the stateful walk with repetition control
// - sections.rs: section map, transition blender, validated section plan
// - shaping.rs: chord densification and the sparsity (pause) ramp
// - compose.rs: `StructureComposer`, the plan-driven composition loop
// - grouping.rs: run, pause, and chunk grouping plus flattening
// - generate.rs: plan-free convenience generators
// - mapfile.rs: map-file parsing, rendering, and plan building from corpora
// - midi.rs: MIDI corpus input and timed MIDI output
// - config.rs: JSON generator configuration
// - error.rs: validation, lookup, and composition errors
//
// Every random draw goes through `refrain_prng::RandomSource`, so output is
// reproducible for a given seed and tests can script the draws.

pub mod compose;
pub mod config;
pub mod error;
pub mod generate;
pub mod grouping;
pub mod mapfile;
pub mod markov;
pub mod midi;
pub mod sections;
pub mod shaping;
pub mod unit;
pub mod walker;

pub use compose::StructureComposer;
pub use error::{ComposeError, LookupError, ValidationError};
pub use sections::{SectionMap, SectionPlan, TransitionBlender};
pub use shaping::{ChordDensifier, Ramp, Shaping, SparsityShaper};
pub use unit::Unit;
pub use walker::{SequenceWalker, WalkOptions};
