// Data-driven generator configuration.
//
// `GeneratorConfig` gathers every tunable the CLI and the library helpers
// read: walk policy, chord growth, the pause sentinel, and MIDI timing. It is
// loaded from JSON (all fields optional, missing ones take their defaults)
// and then overridden by command-line flags in main.rs.

use crate::error::ValidationError;
use crate::markov::FallbackChoice;
use crate::midi::{DEFAULT_TICKS_PER_UNIT, MIN_TEMPO_BPM, Timing, scaled_duration};
use crate::shaping::DEFAULT_PAUSE_NOTE;
use crate::unit::Unit;
use crate::walker::{DEFAULT_REPETITION_CAP, WalkOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Seed for the generator's PRNG. `None` seeds from the clock.
    pub seed: Option<u64>,
    /// Longest run of one unit in plain walks. `None` disables the cap.
    pub repetition_cap: Option<usize>,
    /// Apply `repetition_cap` to composed (sectioned) walks too.
    pub cap_composed_walks: bool,
    /// How dead-end units are patched when building the matrix.
    pub fallback: FallbackChoice,
    /// Maximum notes added to each unit by chord growth.
    pub chord_increase: usize,
    /// MIDI note standing in for a pause.
    pub pause_note: u8,
    /// MIDI ticks per generated unit (480 ticks = one quarter note).
    pub ticks_per_unit: u32,
    /// Output tempo.
    pub tempo_bpm: u16,
    /// Optional rhythm patterns: lists of duration factors.
    pub rhythms: Vec<Vec<u32>>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            seed: None,
            repetition_cap: Some(DEFAULT_REPETITION_CAP),
            cap_composed_walks: false,
            fallback: FallbackChoice::Weighted,
            chord_increase: 1,
            pause_note: DEFAULT_PAUSE_NOTE,
            ticks_per_unit: DEFAULT_TICKS_PER_UNIT,
            tempo_bpm: 120,
            rhythms: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    /// Load from a JSON file and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: GeneratorConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field a later stage would otherwise reject (or, for
    /// timing, silently truncate) mid-run.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.walk_options().validate()?;
        if self.chord_increase == 0 {
            return Err(ValidationError::ZeroChordIncrease);
        }
        if self.pause_note == 0 {
            return Err(ValidationError::ZeroPitch);
        }
        if self.tempo_bpm < MIN_TEMPO_BPM {
            return Err(ValidationError::TempoOutOfRange(self.tempo_bpm));
        }
        if self
            .rhythms
            .iter()
            .any(|pattern| pattern.is_empty() || pattern.contains(&0))
        {
            return Err(ValidationError::InvalidRhythmPattern);
        }
        scaled_duration(self.ticks_per_unit, 1)?;
        for &factor in self.rhythms.iter().flatten() {
            scaled_duration(self.ticks_per_unit, factor)?;
        }
        Ok(())
    }

    /// Options for plain (unsectioned) walks.
    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            repetition_cap: self.repetition_cap,
            fallback: self.fallback,
        }
    }

    /// Options for the composer's shared walk.
    pub fn compose_options(&self) -> WalkOptions {
        let options = self.walk_options();
        if self.cap_composed_walks {
            options
        } else {
            options.uncapped()
        }
    }

    pub fn pause(&self) -> Unit {
        Unit::note(self.pause_note)
    }

    pub fn timing(&self) -> Timing {
        Timing {
            ticks_per_unit: self.ticks_per_unit,
            tempo_bpm: self.tempo_bpm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: GeneratorConfig =
            serde_json::from_str(r#"{"seed": 7, "fallback": "uniform"}"#).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.fallback, FallbackChoice::Uniform);
        assert_eq!(config.repetition_cap, Some(DEFAULT_REPETITION_CAP));
        assert_eq!(config.pause_note, DEFAULT_PAUSE_NOTE);
    }

    #[test]
    fn test_compose_walks_uncapped_by_default() {
        let config = GeneratorConfig::default();
        assert_eq!(config.walk_options().repetition_cap, Some(3));
        assert_eq!(config.compose_options().repetition_cap, None);

        let capped = GeneratorConfig {
            cap_composed_walks: true,
            ..Default::default()
        };
        assert_eq!(capped.compose_options().repetition_cap, Some(3));
    }

    #[test]
    fn test_validation() {
        let zero = GeneratorConfig {
            chord_increase: 0,
            ..Default::default()
        };
        assert_eq!(zero.validate(), Err(ValidationError::ZeroChordIncrease));

        let bad_rhythm = GeneratorConfig {
            rhythms: vec![vec![1, 2], vec![]],
            ..Default::default()
        };
        assert_eq!(bad_rhythm.validate(), Err(ValidationError::InvalidRhythmPattern));
    }

    #[test]
    fn test_zero_repetition_cap_rejected() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"repetition_cap": 0}"#).unwrap();
        assert_eq!(config.validate(), Err(ValidationError::ZeroRepetitionCap));

        // Disabling the cap is spelled `null`.
        let uncapped: GeneratorConfig =
            serde_json::from_str(r#"{"repetition_cap": null}"#).unwrap();
        assert_eq!(uncapped.repetition_cap, None);
        assert!(uncapped.validate().is_ok());
    }

    #[test]
    fn test_timing_bounds() {
        let slow = GeneratorConfig {
            tempo_bpm: 3,
            ..Default::default()
        };
        assert_eq!(slow.validate(), Err(ValidationError::TempoOutOfRange(3)));
        let slowest = GeneratorConfig {
            tempo_bpm: MIN_TEMPO_BPM,
            ..Default::default()
        };
        assert!(slowest.validate().is_ok());

        let long_factor = GeneratorConfig {
            rhythms: vec![vec![1, 2], vec![20_000_000]],
            ..Default::default()
        };
        assert_eq!(
            long_factor.validate(),
            Err(ValidationError::DurationOverflow {
                ticks_per_unit: DEFAULT_TICKS_PER_UNIT,
                factor: 20_000_000,
            })
        );

        let long_unit = GeneratorConfig {
            ticks_per_unit: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(
            long_unit.validate(),
            Err(ValidationError::DurationOverflow { .. })
        ));
    }

    #[test]
    fn test_zero_pause_note_rejected() {
        let config = GeneratorConfig {
            pause_note: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::ZeroPitch));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"tempo_bpm": 90, "rhythms": [[1, 1, 2]]}"#).unwrap();
        let config = GeneratorConfig::load(&path).unwrap();
        assert_eq!(config.tempo_bpm, 90);
        assert_eq!(config.timing().tempo_bpm, 90);
        assert_eq!(config.rhythms, vec![vec![1, 1, 2]]);

        std::fs::write(&path, r#"{"chord_increase": 0}"#).unwrap();
        assert!(matches!(
            GeneratorConfig::load(&path),
            Err(ConfigError::Validation(ValidationError::ZeroChordIncrease))
        ));
    }
}
