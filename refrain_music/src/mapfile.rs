// Map files: the plain-text form of a section plan.
//
// A map file is a list of `key = value` lines. Blank lines and lines starting
// with `#` are ignored. Four keys are recognized:
//
//     # From midi files: ["theme.mid", "variation.mid"]
//     structure = "ABA"
//     sections = [16, 16, 16]
//     transitions = [8, 8]
//     mapping = {"A": [(60,), (62, 64)], "B": [(61,), (63, 65)]}
//
// `transitions` may be omitted (no transitions). Values use a small literal
// grammar: double-quoted strings, non-negative integers, `[...]` lists,
// `(...)` tuples (a trailing comma is allowed, so `(60,)` is a one-note
// tuple), and `{...}` dicts with string keys. Lists and tuples are
// interchangeable wherever a sequence is expected.
//
// Parsing produces a `SectionPlanRecord`, which then goes through the same
// validation as a JSON plan. `build_plan_from_corpora` assembles a fresh plan
// from per-section corpora with default lengths, and `render_map_file` writes
// a plan back out in this format.

use crate::error::ValidationError;
use crate::grouping::ordered_set;
use crate::sections::{HOME_SECTION, SectionPlan, SectionPlanRecord};
use crate::unit::Unit;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Section length used by `build_plan_from_corpora`.
pub const DEFAULT_SECTION_LENGTH: usize = 16;

/// Transition length used by `build_plan_from_corpora`.
pub const DEFAULT_TRANSITION_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum MapFileError {
    #[error("map file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("map file has no `{0}` entry")]
    MissingKey(&'static str),

    #[error("line {line}: unknown key `{key}`")]
    UnknownKey { line: usize, key: String },

    #[error("line {line}: `{key}` must be {expected}")]
    WrongType {
        line: usize,
        key: &'static str,
        expected: &'static str,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A parsed literal.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Int(u64),
    Seq(Vec<Value>),
    Dict(Vec<(String, Value)>),
}

/// Parse map-file text into a validated plan.
pub fn parse_map_file(text: &str) -> Result<SectionPlan, MapFileError> {
    let mut structure = None;
    let mut sections = None;
    let mut transitions = None;
    let mut mapping = None;

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(syntax(line, "expected `key = value`"));
        };
        let key = key.trim();
        let value = parse_value(value, line)?;
        match key {
            "structure" => {
                let Value::Str(s) = value else {
                    return Err(wrong_type(line, "structure", "a string"));
                };
                set_once(&mut structure, s, line, "structure")?;
            }
            "sections" => {
                let lengths = lengths(value, line, "sections")?;
                set_once(&mut sections, lengths, line, "sections")?;
            }
            "transitions" => {
                let lengths = lengths(value, line, "transitions")?;
                set_once(&mut transitions, lengths, line, "transitions")?;
            }
            "mapping" => {
                let map = section_units(value, line)?;
                set_once(&mut mapping, map, line, "mapping")?;
            }
            _ => {
                return Err(MapFileError::UnknownKey {
                    line,
                    key: key.to_string(),
                });
            }
        }
    }

    let record = SectionPlanRecord {
        structure: structure.ok_or(MapFileError::MissingKey("structure"))?,
        sections: sections.ok_or(MapFileError::MissingKey("sections"))?,
        transitions: transitions.unwrap_or_default(),
        mapping: mapping.ok_or(MapFileError::MissingKey("mapping"))?,
    };
    Ok(SectionPlan::try_from(record)?)
}

/// Read and parse a map file.
pub fn read_map_file(path: &Path) -> Result<SectionPlan, MapFileError> {
    let text = std::fs::read_to_string(path)?;
    parse_map_file(&text)
}

/// Render a plan as map-file text. Each line of `header` becomes a comment.
pub fn render_map_file(plan: &SectionPlan, header: &str) -> String {
    let mut out = String::new();
    for line in header.lines() {
        let _ = writeln!(out, "# {line}");
    }
    let _ = writeln!(out, "structure = \"{}\"", plan.structure_string());
    out.push_str("# Length of sections (in units):\n");
    let _ = writeln!(out, "sections = {}", render_lengths(plan.section_lengths()));
    out.push_str("# Length of transitions between sections (in units):\n");
    let _ = writeln!(
        out,
        "transitions = {}",
        render_lengths(plan.transition_lengths())
    );

    let entries: Vec<String> = plan
        .map()
        .iter()
        .map(|(letter, units)| {
            let units: Vec<String> = units.iter().map(Unit::to_string).collect();
            format!("\"{letter}\": [{}]", units.join(", "))
        })
        .collect();
    let _ = writeln!(out, "mapping = {{{}}}", entries.join(", "));
    out
}

/// Render and write a plan to `path`.
pub fn write_map_file(path: &Path, plan: &SectionPlan, header: &str) -> Result<(), MapFileError> {
    std::fs::write(path, render_map_file(plan, header))?;
    Ok(())
}

/// Assemble a plan from one corpus per section.
///
/// Corpora are lettered `A`, `B`, ... in order, and each letter maps to the
/// corpus's distinct units in first-appearance order. Every section gets
/// `DEFAULT_SECTION_LENGTH` units and every transition
/// `DEFAULT_TRANSITION_LENGTH`. The structure must use the home section and
/// every lettered corpus, and nothing else.
pub fn build_plan_from_corpora(
    corpora: &[Vec<Unit>],
    structure: &str,
) -> Result<SectionPlan, ValidationError> {
    if corpora.is_empty() {
        return Err(ValidationError::EmptyCorpus);
    }
    if corpora.len() > 26 {
        return Err(ValidationError::TooManySections(corpora.len()));
    }
    if !structure.contains(HOME_SECTION) {
        return Err(ValidationError::MissingHomeSection);
    }

    let mut mapping = BTreeMap::new();
    for (letter, corpus) in ('A'..='Z').zip(corpora) {
        if corpus.is_empty() {
            return Err(ValidationError::EmptyCorpus);
        }
        if !structure.contains(letter) {
            return Err(ValidationError::UnusedSection(letter));
        }
        mapping.insert(letter, ordered_set(corpus));
    }

    let count = structure.chars().count();
    SectionPlan::new(
        structure,
        vec![DEFAULT_SECTION_LENGTH; count],
        vec![DEFAULT_TRANSITION_LENGTH; count.saturating_sub(1)],
        mapping,
    )
}

fn render_lengths(lengths: &[usize]) -> String {
    let items: Vec<String> = lengths.iter().map(usize::to_string).collect();
    format!("[{}]", items.join(", "))
}

fn syntax(line: usize, message: impl Into<String>) -> MapFileError {
    MapFileError::Syntax {
        line,
        message: message.into(),
    }
}

fn wrong_type(line: usize, key: &'static str, expected: &'static str) -> MapFileError {
    MapFileError::WrongType {
        line,
        key,
        expected,
    }
}

fn set_once<T>(
    slot: &mut Option<T>,
    value: T,
    line: usize,
    key: &'static str,
) -> Result<(), MapFileError> {
    if slot.is_some() {
        return Err(syntax(line, format!("duplicate `{key}` entry")));
    }
    *slot = Some(value);
    Ok(())
}

fn lengths(value: Value, line: usize, key: &'static str) -> Result<Vec<usize>, MapFileError> {
    let Value::Seq(items) = value else {
        return Err(wrong_type(line, key, "a list of integers"));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Int(n) => usize::try_from(n).ok(),
            _ => None,
        })
        .collect::<Option<Vec<usize>>>()
        .ok_or_else(|| wrong_type(line, key, "a list of integers"))
}

fn section_units(value: Value, line: usize) -> Result<BTreeMap<String, Vec<Unit>>, MapFileError> {
    const EXPECTED: &str = "a dict of section letters to lists of non-empty tuples of notes 1-255";
    let Value::Dict(entries) = value else {
        return Err(wrong_type(line, "mapping", EXPECTED));
    };
    let mut mapping = BTreeMap::new();
    for (key, units) in entries {
        let Value::Seq(units) = units else {
            return Err(wrong_type(line, "mapping", EXPECTED));
        };
        let units = units
            .into_iter()
            .map(|unit| to_unit(unit).ok_or_else(|| wrong_type(line, "mapping", EXPECTED)))
            .collect::<Result<Vec<_>, _>>()?;
        if mapping.insert(key.clone(), units).is_some() {
            return Err(syntax(line, format!("duplicate section {key:?}")));
        }
    }
    Ok(mapping)
}

fn to_unit(value: Value) -> Option<Unit> {
    let Value::Seq(items) = value else {
        return None;
    };
    let pitches = items
        .into_iter()
        .map(|item| match item {
            Value::Int(n) => u8::try_from(n).ok(),
            _ => None,
        })
        .collect::<Option<Vec<u8>>>()?;
    Unit::from_notes(&pitches)
}

fn parse_value(text: &str, line: usize) -> Result<Value, MapFileError> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
        line,
    };
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

/// Recursive-descent reader for one value.
struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn value(&mut self) -> Result<Value, MapFileError> {
        self.skip_whitespace();
        match self.peek() {
            Some('"') => self.string().map(Value::Str),
            Some('[') => self.sequence('[', ']').map(Value::Seq),
            Some('(') => self.sequence('(', ')').map(Value::Seq),
            Some('{') => self.dict(),
            Some(c) if c.is_ascii_digit() => self.integer(),
            Some(c) => Err(self.error(format!("unexpected character {c:?}"))),
            None => Err(self.error("missing value")),
        }
    }

    fn string(&mut self) -> Result<String, MapFileError> {
        self.expect('"')?;
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(s),
                Some('\\') => match self.bump() {
                    Some(c) => s.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => s.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn integer(&mut self) -> Result<Value, MapFileError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse()
            .map(Value::Int)
            .map_err(|_| self.error(format!("integer {digits} is too large")))
    }

    /// Comma-separated values between `open` and `close`; a trailing comma
    /// is accepted.
    fn sequence(&mut self, open: char, close: char) -> Result<Vec<Value>, MapFileError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_whitespace();
            if !self.eat(',') {
                self.skip_whitespace();
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn dict(&mut self) -> Result<Value, MapFileError> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace();
            if self.eat('}') {
                return Ok(Value::Dict(entries));
            }
            if self.peek() != Some('"') {
                return Err(self.error("dict keys must be strings"));
            }
            let key = self.string()?;
            self.skip_whitespace();
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));
            self.skip_whitespace();
            if !self.eat(',') {
                self.skip_whitespace();
                self.expect('}')?;
                return Ok(Value::Dict(entries));
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), MapFileError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}")))
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, message: impl Into<String>) -> MapFileError {
        let message = message.into();
        syntax(self.line, format!("{message} at column {}", self.pos + 1))
    }
}
