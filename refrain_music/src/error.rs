// Error types for the generator.
//
// Two families matter to the engine:
// - `ValidationError`: a structural precondition is violated. Always raised
//   at a construction boundary, before any random draw is consumed, so a long
//   run never aborts halfway through because of a configuration mistake.
// - `LookupError`: a unit or section letter cannot be resolved against the
//   section map while composing. Raised at the point of use; it signals a
//   corpus/map mismatch and is never retried.
//
// `ComposeError` unifies both for composer callers. The collaborator modules
// (map files, MIDI, config) have their own error enums that wrap
// `ValidationError` where a parsed record fails its invariants.

use crate::unit::Unit;
use thiserror::Error;

/// A structural precondition was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("corpus is empty; there are no units to key the transition matrix by")]
    EmptyCorpus,

    #[error("a unit must contain at least one note")]
    EmptyUnit,

    #[error("cannot group an empty sequence")]
    EmptySequence,

    #[error("structure is empty")]
    EmptyStructure,

    #[error("section map has no home section 'A'")]
    MissingHomeSection,

    #[error("section '{0}' is not in the section map")]
    UnknownSection(char),

    #[error("section '{0}' has a corpus but is not used by the structure")]
    UnusedSection(char),

    #[error("invalid section letter {0:?}: expected a single uppercase character")]
    InvalidSectionLetter(String),

    #[error("at most 26 sections are supported, got {0}")]
    TooManySections(usize),

    #[error("section '{letter}' lists {found} units but the home section lists {expected}")]
    UnevenSection {
        letter: char,
        expected: usize,
        found: usize,
    },

    #[error("expected {expected} section lengths (one per structure letter), found {found}")]
    SectionCountMismatch { expected: usize, found: usize },

    #[error("expected {expected} transition lengths (one fewer than sections), found {found}")]
    TransitionCountMismatch { expected: usize, found: usize },

    #[error("chord increase must be at least 1")]
    ZeroChordIncrease,

    #[error("chunk size must be at least 1")]
    ZeroChunkSize,

    #[error("rhythm patterns must be non-empty lists of positive factors")]
    InvalidRhythmPattern,

    #[error("repetition cap must be at least 1 (omit it to disable the cap)")]
    ZeroRepetitionCap,

    #[error("a unit of {ticks_per_unit} ticks times factor {factor} exceeds the longest MIDI delta")]
    DurationOverflow { ticks_per_unit: u32, factor: u32 },

    #[error("tempo {0} BPM is too slow for a MIDI tempo event (minimum 4)")]
    TempoOutOfRange(u16),

    #[error("note 0 is not a valid pitch; notes are positive MIDI numbers")]
    ZeroPitch,
}

/// A unit or section could not be resolved while composing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("unit {0} does not appear in the home section 'A'")]
    UnitNotInHome(Unit),

    #[error("section '{0}' is not in the section map")]
    UnknownSection(char),
}

/// Failure of a composition call. No partial output accompanies it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}
