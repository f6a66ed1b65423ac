// MIDI input and output for unit sequences.
//
// Reading: every track's note events are folded into units. A note-on that
// arrives with zero delta joins the chord being collected; a note-on after a
// nonzero delta starts a new one; any note-off (or note-on with velocity 0)
// closes the current chord. Chords never span tracks.
//
// Writing: a single-track SMF (format 0) with a 4/4 time signature, tempo,
// and piano program, then per unit all note-ons at once and the note-offs
// after the unit's duration (carried by the root's note-off).
//
// Durations come from `assign_durations`: a flat `ticks_per_unit` per unit,
// or random rhythm patterns whose longer factors swallow the units they
// cover, so the output keeps roughly the same overall length in beats.
//
// Uses the `midly` crate for MIDI parsing and writing.

use crate::error::ValidationError;
use crate::unit::Unit;
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use refrain_prng::RandomSource;
use std::path::Path;
use thiserror::Error;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Default duration of one unit: an eighth note.
pub const DEFAULT_TICKS_PER_UNIT: u32 = TICKS_PER_QUARTER as u32 / 2;

/// Longest delta a MIDI event can carry (28 bits).
pub const MAX_DURATION_TICKS: u32 = 0x0FFF_FFFF;

/// Slowest tempo whose microseconds-per-quarter fits the 24-bit tempo event.
pub const MIN_TEMPO_BPM: u16 = 4;

const MICROS_PER_MINUTE: u32 = 60_000_000;

const CHANNEL: u8 = 0;
const VELOCITY: u8 = 64;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("MIDI file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse MIDI: {0}")]
    Parse(#[from] midly::Error),

    #[error("note {0} is outside the MIDI range 0-127")]
    NoteOutOfRange(u8),

    #[error("duration of {0} ticks exceeds the 28-bit MIDI delta limit")]
    DurationOutOfRange(u32),

    #[error("tempo {0} BPM is below the MIDI minimum of 4")]
    TempoOutOfRange(u16),
}

/// Output timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub ticks_per_unit: u32,
    pub tempo_bpm: u16,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            ticks_per_unit: DEFAULT_TICKS_PER_UNIT,
            tempo_bpm: 120,
        }
    }
}

/// Read a MIDI file into a unit corpus.
pub fn read_midi(path: &Path) -> Result<Vec<Unit>, MidiError> {
    let bytes = std::fs::read(path)?;
    let smf = Smf::parse(&bytes)?;
    Ok(units_from_smf(&smf))
}

/// Fold the note events of every track into units.
pub fn units_from_smf(smf: &Smf) -> Vec<Unit> {
    let mut units = Vec::new();
    for track in &smf.tracks {
        let mut chord: Vec<u8> = Vec::new();
        for event in track {
            let (key, sounding) = match event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, vel },
                    ..
                } => (key.as_int(), vel.as_int() > 0),
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, .. },
                    ..
                } => (key.as_int(), false),
                _ => continue,
            };
            // Key 0 has no pitch a unit can carry.
            if key == 0 {
                continue;
            }
            if sounding {
                if event.delta.as_int() > 0 {
                    flush_chord(&mut chord, &mut units);
                }
                chord.push(key);
            } else {
                flush_chord(&mut chord, &mut units);
            }
        }
        flush_chord(&mut chord, &mut units);
    }
    units
}

fn flush_chord(chord: &mut Vec<u8>, units: &mut Vec<Unit>) {
    if let Some(unit) = Unit::from_notes(chord) {
        units.push(unit);
    }
    chord.clear();
}

/// Pair every unit with a duration in ticks.
///
/// With no rhythm patterns each unit lasts `ticks_per_unit`. Otherwise a
/// pattern is drawn at random, and for each factor in it the unit at the
/// current position is emitted with `ticks_per_unit * factor` ticks before
/// the position advances by `factor`. A product past `MAX_DURATION_TICKS`
/// is rejected rather than wrapped.
pub fn assign_durations(
    units: &[Unit],
    ticks_per_unit: u32,
    rhythms: &[Vec<u32>],
    rng: &mut impl RandomSource,
) -> Result<Vec<(Unit, u32)>, ValidationError> {
    if rhythms.is_empty() {
        scaled_duration(ticks_per_unit, 1)?;
        return Ok(units.iter().map(|u| (u.clone(), ticks_per_unit)).collect());
    }
    if rhythms.iter().any(|p| p.is_empty() || p.contains(&0)) {
        return Err(ValidationError::InvalidRhythmPattern);
    }

    let mut events = Vec::new();
    let mut index = 0usize;
    while index < units.len() {
        let Some(pattern) = rng.choose(rhythms) else {
            break;
        };
        for &factor in pattern {
            let Some(unit) = units.get(index) else {
                break;
            };
            events.push((unit.clone(), scaled_duration(ticks_per_unit, factor)?));
            index += factor as usize;
        }
    }
    Ok(events)
}

/// `ticks_per_unit * factor`, if it fits in a MIDI delta.
pub fn scaled_duration(ticks_per_unit: u32, factor: u32) -> Result<u32, ValidationError> {
    ticks_per_unit
        .checked_mul(factor)
        .filter(|ticks| *ticks <= MAX_DURATION_TICKS)
        .ok_or(ValidationError::DurationOverflow {
            ticks_per_unit,
            factor,
        })
}

/// Write timed units to a MIDI file.
pub fn write_midi(path: &Path, events: &[(Unit, u32)], tempo_bpm: u16) -> Result<(), MidiError> {
    let smf = events_to_smf(events, tempo_bpm)?;
    smf.save(path)?;
    Ok(())
}

/// Convert timed units to an in-memory single-track SMF.
pub fn events_to_smf(events: &[(Unit, u32)], tempo_bpm: u16) -> Result<Smf<'static>, MidiError> {
    if tempo_bpm < MIN_TEMPO_BPM {
        return Err(MidiError::TempoOutOfRange(tempo_bpm));
    }
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        midly::Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));
    let channel = u4::new(CHANNEL);

    let mut track: Track<'static> = vec![
        meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
        meta(MetaMessage::KeySignature(0, false)),
        meta(MetaMessage::Tempo(u24::new(
            MICROS_PER_MINUTE / u32::from(tempo_bpm),
        ))),
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange { program: u7::new(0) },
            },
        },
    ];

    for (unit, duration) in events {
        if *duration > MAX_DURATION_TICKS {
            return Err(MidiError::DurationOutOfRange(*duration));
        }
        for &pitch in unit.notes() {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key: key(pitch)?,
                        vel: u7::new(VELOCITY),
                    },
                },
            });
        }
        for (i, &pitch) in unit.notes().iter().enumerate() {
            track.push(TrackEvent {
                delta: u28::new(if i == 0 { *duration } else { 0 }),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key: key(pitch)?,
                        vel: u7::new(0),
                    },
                },
            });
        }
    }

    track.push(meta(MetaMessage::EndOfTrack));
    smf.tracks.push(track);
    Ok(smf)
}

fn meta(message: MetaMessage<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(message),
    }
}

fn key(pitch: u8) -> Result<u7, MidiError> {
    if pitch > 127 {
        return Err(MidiError::NoteOutOfRange(pitch));
    }
    Ok(u7::new(pitch))
}
