// Sections: positional mapping of units into lettered variants.
//
// A `SectionMap` assigns each section letter an ordered list of units. The
// lists are positionally aligned: index i in every list plays the same
// musical role. Section 'A' is the home section, and the Markov walk always
// runs in home-section units; `map_unit` translates a walked unit into any
// other section by finding its (first) index in the home list and reading
// the target list at that index.
//
// `TransitionBlender` bridges two sections over a fixed number of steps,
// mapping each step into one of the two with a probability that drifts
// linearly from the first towards the second.
//
// `SectionPlan` is the validated form of a map file (mapfile.rs): the
// structure string, per-letter section lengths, transition lengths, and the
// section map. All of its invariants are checked once, in `SectionPlan::new`.

use crate::error::{LookupError, ValidationError};
use crate::unit::Unit;
use refrain_prng::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The canonical section every lookup is resolved against.
pub const HOME_SECTION: char = 'A';

/// Letter → positionally aligned unit list, with 'A' always present.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionMap {
    sections: BTreeMap<char, Vec<Unit>>,
    /// First index of each unit in the home list.
    home_index: BTreeMap<Unit, usize>,
}

impl SectionMap {
    pub fn new(sections: BTreeMap<char, Vec<Unit>>) -> Result<Self, ValidationError> {
        if let Some(bad) = sections.keys().find(|l| !l.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidSectionLetter(bad.to_string()));
        }
        let home = sections
            .get(&HOME_SECTION)
            .ok_or(ValidationError::MissingHomeSection)?;
        for (&letter, units) in &sections {
            if units.len() != home.len() {
                return Err(ValidationError::UnevenSection {
                    letter,
                    expected: home.len(),
                    found: units.len(),
                });
            }
        }

        let mut home_index = BTreeMap::new();
        for (i, unit) in home.iter().enumerate() {
            home_index.entry(unit.clone()).or_insert(i);
        }
        Ok(SectionMap {
            sections,
            home_index,
        })
    }

    /// Translate a home-section unit into section `target`.
    pub fn map_unit(&self, unit: &Unit, target: char) -> Result<&Unit, LookupError> {
        let index = *self
            .home_index
            .get(unit)
            .ok_or_else(|| LookupError::UnitNotInHome(unit.clone()))?;
        let units = self
            .sections
            .get(&target)
            .ok_or(LookupError::UnknownSection(target))?;
        Ok(&units[index])
    }

    pub fn home(&self) -> &[Unit] {
        &self.sections[&HOME_SECTION]
    }

    pub fn section(&self, letter: char) -> Option<&[Unit]> {
        self.sections.get(&letter).map(Vec::as_slice)
    }

    pub fn contains(&self, letter: char) -> bool {
        self.sections.contains_key(&letter)
    }

    pub fn letters(&self) -> impl Iterator<Item = char> + '_ {
        self.sections.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, &[Unit])> {
        self.sections.iter().map(|(&l, u)| (l, u.as_slice()))
    }

    /// Number of aligned positions (length of every list).
    pub fn width(&self) -> usize {
        self.home().len()
    }
}

/// Probabilistic cross-fade from one section to another.
#[derive(Debug, Clone)]
pub struct TransitionBlender {
    lower: char,
    higher: char,
    ascending: bool,
    probability: f64,
    step: f64,
}

impl TransitionBlender {
    /// A bridge of `length` steps from `first` to `second`.
    ///
    /// Ascending (`first < second`): the chance of mapping into `second`
    /// rises from 0. Descending: the chance of mapping into `first` falls
    /// from 1. Either way step 0 lands in `first`.
    pub fn new(first: char, second: char, length: usize) -> Self {
        let ascending = first < second;
        let (lower, higher) = if ascending {
            (first, second)
        } else {
            (second, first)
        };
        TransitionBlender {
            lower,
            higher,
            ascending,
            probability: if ascending { 0.0 } else { 1.0 },
            step: if length == 0 { 0.0 } else { 1.0 / length as f64 },
        }
    }

    /// Choose the section for the next step, then move the probability.
    pub fn next_section(&mut self, rng: &mut impl RandomSource) -> char {
        let letter = if rng.next_f64() < self.probability {
            self.higher
        } else {
            self.lower
        };
        if self.ascending {
            self.probability += self.step;
        } else {
            self.probability -= self.step;
        }
        letter
    }

    /// Map one walked unit through the bridge.
    pub fn blend<'m>(
        &mut self,
        unit: &Unit,
        map: &'m SectionMap,
        rng: &mut impl RandomSource,
    ) -> Result<&'m Unit, LookupError> {
        let letter = self.next_section(rng);
        map.map_unit(unit, letter)
    }

    /// Probability of choosing the higher section on the next step.
    pub fn probability(&self) -> f64 {
        self.probability
    }
}

/// One stretch of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Section { letter: char, length: usize },
    Transition { from: char, to: char, length: usize },
}

impl Segment {
    pub fn length(&self) -> usize {
        match *self {
            Segment::Section { length, .. } | Segment::Transition { length, .. } => length,
        }
    }
}

/// Validated structure + lengths + section map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SectionPlanRecord", into = "SectionPlanRecord")]
pub struct SectionPlan {
    structure: Vec<char>,
    section_lengths: Vec<usize>,
    transition_lengths: Vec<usize>,
    map: SectionMap,
}

impl SectionPlan {
    /// Check every invariant of a plan. An empty `transitions` list means no
    /// transitions (all zero).
    pub fn new(
        structure: &str,
        sections: Vec<usize>,
        transitions: Vec<usize>,
        mapping: BTreeMap<char, Vec<Unit>>,
    ) -> Result<Self, ValidationError> {
        let structure: Vec<char> = structure.chars().collect();
        if structure.is_empty() {
            return Err(ValidationError::EmptyStructure);
        }
        let map = SectionMap::new(mapping)?;
        if let Some(&missing) = structure.iter().find(|l| !map.contains(**l)) {
            return Err(ValidationError::UnknownSection(missing));
        }
        if sections.len() != structure.len() {
            return Err(ValidationError::SectionCountMismatch {
                expected: structure.len(),
                found: sections.len(),
            });
        }
        let transitions = if transitions.is_empty() {
            vec![0; structure.len() - 1]
        } else if transitions.len() != structure.len() - 1 {
            return Err(ValidationError::TransitionCountMismatch {
                expected: structure.len() - 1,
                found: transitions.len(),
            });
        } else {
            transitions
        };

        Ok(SectionPlan {
            structure,
            section_lengths: sections,
            transition_lengths: transitions,
            map,
        })
    }

    pub fn structure(&self) -> &[char] {
        &self.structure
    }

    pub fn structure_string(&self) -> String {
        self.structure.iter().collect()
    }

    pub fn section_lengths(&self) -> &[usize] {
        &self.section_lengths
    }

    pub fn transition_lengths(&self) -> &[usize] {
        &self.transition_lengths
    }

    pub fn map(&self) -> &SectionMap {
        &self.map
    }

    /// Sum of all section and transition lengths.
    pub fn total_length(&self) -> usize {
        self.section_lengths.iter().sum::<usize>() + self.transition_lengths.iter().sum::<usize>()
    }

    /// Sections interleaved with the transitions between them, in order.
    pub fn segments(&self) -> Vec<Segment> {
        let mut segments = Vec::with_capacity(self.structure.len() * 2);
        for (i, &letter) in self.structure.iter().enumerate() {
            segments.push(Segment::Section {
                letter,
                length: self.section_lengths[i],
            });
            if let Some(&next) = self.structure.get(i + 1) {
                segments.push(Segment::Transition {
                    from: letter,
                    to: next,
                    length: self.transition_lengths[i],
                });
            }
        }
        segments
    }
}

/// Serialized shape of a plan (JSON and map files).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPlanRecord {
    pub structure: String,
    pub sections: Vec<usize>,
    #[serde(default)]
    pub transitions: Vec<usize>,
    pub mapping: BTreeMap<String, Vec<Unit>>,
}

impl TryFrom<SectionPlanRecord> for SectionPlan {
    type Error = ValidationError;

    fn try_from(record: SectionPlanRecord) -> Result<Self, Self::Error> {
        let mut mapping = BTreeMap::new();
        for (key, units) in record.mapping {
            mapping.insert(section_letter(&key)?, units);
        }
        SectionPlan::new(&record.structure, record.sections, record.transitions, mapping)
    }
}

impl From<SectionPlan> for SectionPlanRecord {
    fn from(plan: SectionPlan) -> Self {
        SectionPlanRecord {
            structure: plan.structure_string(),
            sections: plan.section_lengths,
            transitions: plan.transition_lengths,
            mapping: plan
                .map
                .sections
                .into_iter()
                .map(|(l, u)| (l.to_string(), u))
                .collect(),
        }
    }
}

/// Parse a one-character section key.
pub(crate) fn section_letter(key: &str) -> Result<char, ValidationError> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Ok(c),
        _ => Err(ValidationError::InvalidSectionLetter(key.to_string())),
    }
}
