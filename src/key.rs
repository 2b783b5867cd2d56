//! # Camelot Key Engine
//!
//! Harmonic keys are handled in Camelot wheel notation: twelve positions,
//! each with a minor (`A`) and a major (`B`) mode. This module parses and
//! normalizes key spellings and classifies the harmonic relation between
//! two keys, which is the only gate deciding whether a transition is legal.
//!
//! ```
//! use mixset::key::{normalize_key, relation, Relation};
//!
//! assert_eq!(normalize_key("F# Minor"), "11A");
//! assert_eq!(relation("8A", "9A"), Relation::Up);
//! assert_eq!(relation("8A", "8B"), Relation::Switch);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Minor (`A`) or major (`B`) side of the wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mode {
    A,
    B,
}

impl Mode {
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Mode::A => 'A',
            Mode::B => 'B',
        }
    }
}

/// A position on the Camelot wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CamelotKey {
    position: u8,
    mode: Mode,
}

/// The A/B pair sharing one wheel position, identified by that position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwitchPair(pub u8);

impl fmt::Display for SwitchPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{0}A-{0}B", self.0)
    }
}

/// Harmonic relation from a previous key to a candidate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Same,
    Switch,
    Up,
    Down,
    Fifth,
    Invalid,
}

impl Relation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Relation::Same => "same",
            Relation::Switch => "switch",
            Relation::Up => "up",
            Relation::Down => "down",
            Relation::Fifth => "fifth",
            Relation::Invalid => "invalid",
        }
    }

    #[must_use]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Relation::Invalid)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl CamelotKey {
    /// Build a key from its parts. Returns `None` outside positions 1-12.
    #[must_use]
    pub const fn new(position: u8, mode: Mode) -> Option<Self> {
        if position >= 1 && position <= 12 {
            Some(Self { position, mode })
        } else {
            None
        }
    }

    /// Parse wheel notation such as `"8A"` or `"12b"`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let letter = trimmed.chars().last()?;
        let number = &trimmed[..trimmed.len() - letter.len_utf8()];
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let mode = match letter.to_ascii_uppercase() {
            'A' => Mode::A,
            'B' => Mode::B,
            _ => return None,
        };
        Self::new(number.parse().ok()?, mode)
    }

    /// Convert a pitch-class annotation (0 = C ... 11 = B) as reported by
    /// streaming-service audio features.
    #[must_use]
    pub fn from_pitch_class(pitch_class: u8, minor: bool) -> Option<Self> {
        const MINOR: [u8; 12] = [5, 12, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10];
        const MAJOR: [u8; 12] = [8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6, 1];
        let table = if minor { &MINOR } else { &MAJOR };
        let position = *table.get(usize::from(pitch_class))?;
        Self::new(position, if minor { Mode::A } else { Mode::B })
    }

    /// All 24 keys, minor ring first, each ring starting at 12.
    #[must_use]
    pub fn all() -> Vec<Self> {
        [Mode::A, Mode::B]
            .into_iter()
            .flat_map(|mode| {
                std::iter::once(12)
                    .chain(1..12)
                    .map(move |position| Self { position, mode })
            })
            .collect()
    }

    #[must_use]
    pub const fn position(self) -> u8 {
        self.position
    }

    #[must_use]
    pub const fn mode(self) -> Mode {
        self.mode
    }

    /// The switch pair two keys form, if they share a position but not a mode.
    #[must_use]
    pub fn switch_pair(self, other: Self) -> Option<SwitchPair> {
        (self.position == other.position && self.mode != other.mode)
            .then_some(SwitchPair(self.position))
    }

    /// Classify the transition from `self` to `next`.
    #[must_use]
    pub fn relation_to(self, next: Self) -> Relation {
        let (p1, p2) = (i16::from(self.position), i16::from(next.position));
        let step = |offset: i16| (p1 + offset).rem_euclid(12) + 1;

        if p1 == p2 {
            return if self.mode == next.mode {
                Relation::Same
            } else {
                Relation::Switch
            };
        }
        if self.mode != next.mode {
            return Relation::Invalid;
        }
        if step(0) == p2 {
            Relation::Up
        } else if step(-2) == p2 {
            Relation::Down
        } else if step(4) == p2 || step(-6) == p2 {
            Relation::Fifth
        } else {
            Relation::Invalid
        }
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{}{}", self.position, self.mode.letter()))
    }
}

impl std::str::FromStr for CamelotKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(&normalize_key(s))
            .ok_or_else(|| anyhow::anyhow!("'{s}' is not a Camelot key or known musical key"))
    }
}

lazy_static::lazy_static! {
    /// Musical spellings (including enharmonic equivalents) to wheel notation.
    static ref MUSICAL_TO_CAMELOT: HashMap<&'static str, &'static str> = HashMap::from([
        ("C Minor", "5A"), ("G Minor", "6A"), ("D Minor", "7A"), ("A Minor", "8A"),
        ("E Minor", "9A"), ("B Minor", "10A"), ("F# Minor", "11A"), ("Gb Minor", "11A"),
        ("C# Minor", "12A"), ("Db Minor", "12A"), ("Ab Minor", "1A"), ("G# Minor", "1A"),
        ("Eb Minor", "2A"), ("D# Minor", "2A"), ("Bb Minor", "3A"), ("A# Minor", "3A"),
        ("F Minor", "4A"),
        ("C Major", "8B"), ("G Major", "9B"), ("D Major", "10B"), ("A Major", "11B"),
        ("E Major", "12B"), ("B Major", "1B"), ("F# Major", "2B"), ("Gb Major", "2B"),
        ("Db Major", "3B"), ("C# Major", "3B"), ("Ab Major", "4B"), ("G# Major", "4B"),
        ("Eb Major", "5B"), ("D# Major", "5B"), ("Bb Major", "6B"), ("A# Major", "6B"),
        ("F Major", "7B"),
    ]);
}

/// Normalize a key spelling into wheel notation.
///
/// Wheel notation passes through (upper-cased mode letter); known musical
/// spellings are translated; anything else is returned trimmed and unchanged
/// so that it later fails key matching instead of being guessed at.
#[must_use]
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(key) = CamelotKey::parse(trimmed) {
        return key.to_string();
    }
    MUSICAL_TO_CAMELOT
        .get(trimmed)
        .map_or_else(|| trimmed.to_string(), |camelot| (*camelot).to_string())
}

/// Relation between two key strings; malformed keys map to [`Relation::Invalid`].
#[must_use]
pub fn relation(prev: &str, curr: &str) -> Relation {
    match (CamelotKey::parse(prev), CamelotKey::parse(curr)) {
        (Some(a), Some(b)) => a.relation_to(b),
        _ => Relation::Invalid,
    }
}
