//! Track records as stored in the catalog and as carried through a setlist.

use crate::key::{normalize_key, CamelotKey};
use crate::phase::Phase;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A numeric annotation that may have been stored as a number or as text.
///
/// The raw form is kept so a catalog round-trips unchanged; [`Numeric::value`]
/// yields `None` for anything that does not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => n.is_finite().then_some(*n),
            Numeric::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

impl From<f64> for Numeric {
    fn from(n: f64) -> Self {
        Numeric::Number(n)
    }
}

/// Where a track can be previewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Preview {
    Spotify(String),
    Youtube(String),
}

/// One catalog entry, or a setlist-scoped copy of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub artist: String,
    #[serde(rename = "track", alias = "title", default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<Numeric>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<Numeric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_id: Option<String>,
    /// Phase this copy was placed in. Never persisted to the catalog.
    #[serde(default, deserialize_with = "lenient_stage", skip_serializing_if = "Option::is_none")]
    pub stage: Option<Phase>,
    #[serde(rename = "isLocked", default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
    /// Fields this crate does not interpret, preserved on save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_stage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Phase>, D::Error> {
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(label.and_then(|label| {
        let phase = Phase::from_label(&label);
        if phase.is_none() {
            log::warn!("Ignoring unknown stage label '{label}'");
        }
        phase
    }))
}

/// De-duplication identity for an artist and title: `"artist - title"`,
/// trimmed and lowercased.
#[must_use]
pub fn identity_of(artist: &str, title: &str) -> String {
    format!("{} - {}", artist.trim(), title.trim()).to_lowercase()
}

/// Energy assumed when a record carries none.
pub const DEFAULT_ENERGY: i64 = 5;

impl Track {
    /// Create a track with numeric annotations; mostly useful for fixtures.
    #[must_use]
    pub fn new(artist: &str, title: &str, bpm: f64, key: &str, energy: i64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let energy = energy as f64;
        Self {
            artist: artist.to_string(),
            title: title.to_string(),
            bpm: Some(Numeric::Number(bpm)),
            key: normalize_key(key),
            energy: Some(Numeric::Number(energy)),
            spotify_id: None,
            youtube_id: None,
            stage: None,
            locked: false,
            extra: serde_json::Map::new(),
        }
    }

    /// De-duplication identity within one setlist.
    #[must_use]
    pub fn identity(&self) -> String {
        identity_of(&self.artist, &self.title)
    }

    #[must_use]
    pub fn tempo(&self) -> Option<f64> {
        self.bpm.as_ref().and_then(Numeric::value)
    }

    /// Integer energy; `None` when the stored value is not numeric.
    #[must_use]
    pub fn energy_level(&self) -> Option<i64> {
        match &self.energy {
            None => Some(DEFAULT_ENERGY),
            #[allow(clippy::cast_possible_truncation)]
            Some(raw) => raw.value().map(|v| v.trunc() as i64),
        }
    }

    #[must_use]
    pub fn camelot(&self) -> Option<CamelotKey> {
        CamelotKey::parse(&self.key)
    }

    /// Known preview, preferring Spotify.
    #[must_use]
    pub fn preview(&self) -> Option<Preview> {
        self.spotify_id
            .clone()
            .map(Preview::Spotify)
            .or_else(|| self.youtube_id.clone().map(Preview::Youtube))
    }

    /// Setlist copy tagged with a phase; drops any lock flag it carried.
    #[must_use]
    pub fn staged(&self, phase: Phase) -> Self {
        Self {
            stage: Some(phase),
            locked: false,
            ..self.clone()
        }
    }

    /// Catalog form: setlist-only tags stripped.
    #[must_use]
    pub fn unstaged(&self) -> Self {
        Self {
            stage: None,
            locked: false,
            ..self.clone()
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}
