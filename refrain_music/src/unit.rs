// Musical units: single notes and chords.
//
// A `Unit` is an immutable, non-empty tuple of positive MIDI note numbers.
// A 1-tuple is a single note, anything longer is a chord whose notes share
// an onset. Note 0 is never a pitch.
// Units compare and order like tuples (lexicographically), which is what
// makes transition-matrix candidate order reproducible (see markov.rs).
//
// The first note is the unit's root. Chord growth (shaping.rs) keys its
// duplicate check on roots, and the MIDI writer hangs the unit's duration on
// the root's note-off.
//
// `Display` renders the tuple form used by map files: `(60,)`, `(60, 64)`.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// A note or chord, stored as MIDI note numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Unit(SmallVec<[u8; 4]>);

impl Unit {
    /// A single note. `pitch` must be positive.
    pub fn note(pitch: u8) -> Self {
        debug_assert!(pitch > 0, "note 0 is not a pitch");
        Unit(SmallVec::from_slice(&[pitch]))
    }

    /// A chord (or note) from a slice of pitches. `None` if empty or if any
    /// pitch is 0.
    pub fn from_notes(notes: &[u8]) -> Option<Self> {
        Self::checked(notes).ok()
    }

    fn checked(notes: &[u8]) -> Result<Self, ValidationError> {
        if notes.is_empty() {
            return Err(ValidationError::EmptyUnit);
        }
        if notes.contains(&0) {
            return Err(ValidationError::ZeroPitch);
        }
        Ok(Unit(SmallVec::from_slice(notes)))
    }

    pub fn notes(&self) -> &[u8] {
        &self.0
    }

    /// The first note of the unit.
    pub fn root(&self) -> u8 {
        self.0[0]
    }

    /// Number of simultaneous notes.
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn is_chord(&self) -> bool {
        self.0.len() > 1
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.0.contains(&pitch)
    }

    /// A new unit with `pitch` appended after the existing notes.
    pub fn with_note(&self, pitch: u8) -> Self {
        debug_assert!(pitch > 0, "note 0 is not a pitch");
        let mut notes = self.0.clone();
        notes.push(pitch);
        Unit(notes)
    }
}

impl From<u8> for Unit {
    fn from(pitch: u8) -> Self {
        Unit::note(pitch)
    }
}

impl TryFrom<Vec<u8>> for Unit {
    type Error = ValidationError;

    fn try_from(notes: Vec<u8>) -> Result<Self, Self::Error> {
        Unit::checked(&notes)
    }
}

impl From<Unit> for Vec<u8> {
    fn from(unit: Unit) -> Self {
        unit.0.into_vec()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, pitch) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{pitch}")?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

/// Build a corpus of single notes. Mostly a convenience for tests and for
/// corpora that arrive as plain pitch lists.
pub fn notes(pitches: &[u8]) -> Vec<Unit> {
    pitches.iter().copied().map(Unit::note).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_tuple_syntax() {
        assert_eq!(Unit::note(60).to_string(), "(60,)");
        assert_eq!(Unit::from_notes(&[60, 64, 67]).unwrap().to_string(), "(60, 64, 67)");
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = Unit::note(60);
        let b = Unit::from_notes(&[60, 64]).unwrap();
        let c = Unit::note(61);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_with_note_grows_arity() {
        let chord = Unit::note(60).with_note(64);
        assert_eq!(chord.notes(), &[60, 64]);
        assert_eq!(chord.root(), 60);
        assert!(chord.is_chord());
    }

    #[test]
    fn test_empty_unit_rejected() {
        assert!(Unit::from_notes(&[]).is_none());
        let parsed: Result<Unit, _> = serde_json::from_str("[]");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_zero_pitch_rejected() {
        assert!(Unit::from_notes(&[0]).is_none());
        assert!(Unit::from_notes(&[60, 0, 64]).is_none());
        assert_eq!(Unit::try_from(vec![0u8]), Err(ValidationError::ZeroPitch));
        assert_eq!(Unit::try_from(Vec::<u8>::new()), Err(ValidationError::EmptyUnit));
        let parsed: Result<Unit, _> = serde_json::from_str("[0]");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_serde_as_plain_array() {
        let unit = Unit::from_notes(&[62, 65]).unwrap();
        let json = serde_json::to_string(&unit).unwrap();
        assert_eq!(json, "[62,65]");
        let back: Unit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unit);
    }
}
