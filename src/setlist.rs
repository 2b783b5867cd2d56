//! # Setlist Assembly
//!
//! Three flows share the selection pipeline in [`crate::algorithm`]:
//!
//! - [`SetlistGenerator::generate`] builds a set from scratch,
//! - [`SetlistGenerator::generate_locked`] keeps the user's locked tracks as
//!   a fixed opening and fills the rest,
//! - [`SetlistGenerator::replace_slot`] swaps a single track.
//!
//! Each call owns its own [`SelectionState`], so concurrent generations never
//! observe each other's counters.
//!
//! ```
//! use mixset::setlist::SetlistGenerator;
//! use mixset::algorithm::ScoringConfig;
//! use mixset::track::Track;
//! use rand::SeedableRng;
//!
//! let catalog = vec![Track::new("Guy J", "Lamur", 118.0, "8A", 3)];
//! let config = ScoringConfig::default();
//! let generator = SetlistGenerator::new(&catalog, &config);
//! let set = generator.generate(1, None, &mut rand::rngs::StdRng::seed_from_u64(1));
//! assert_eq!(set.len(), 1);
//! ```

use crate::algorithm::{find_next, ScoringConfig, SelectionRequest, SelectionState};
use crate::filter;
use crate::key::Relation;
use crate::phase::{self, Phase};
use crate::track::Track;
use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use thiserror::Error;

/// Duration assumed for the fifth-jump budget of a single replacement.
pub const REPLACEMENT_HOURS: u32 = 1;

/// Why a slot could not be replaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplaceError {
    #[error("the first track has no predecessor to mix from and cannot be replaced")]
    FirstSlot,
    #[error("slot {index} is out of range for a setlist of {len} tracks")]
    OutOfRange { index: usize, len: usize },
    #[error("no compatible alternative found for slot {index}")]
    NoCandidate { index: usize },
}

/// Builds setlists from a catalog snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SetlistGenerator<'a> {
    catalog: &'a [Track],
    config: &'a ScoringConfig,
}

/// Running bookkeeping of a set under construction.
struct Draft {
    tracks: Vec<Track>,
    used: HashSet<String>,
    recent_keys: Vec<String>,
    state: SelectionState,
}

impl Draft {
    fn from_prefix(prefix: Vec<Track>) -> Self {
        Self {
            used: prefix.iter().map(Track::identity).collect(),
            recent_keys: prefix.iter().map(|t| t.key.clone()).collect(),
            state: SelectionState::replayed(&prefix),
            tracks: prefix,
        }
    }

    fn push(&mut self, track: Track) {
        self.used.insert(track.identity());
        self.recent_keys.push(track.key.clone());
        self.tracks.push(track);
    }
}

impl<'a> SetlistGenerator<'a> {
    #[must_use]
    pub fn new(catalog: &'a [Track], config: &'a ScoringConfig) -> Self {
        Self { catalog, config }
    }

    fn select<R: Rng + ?Sized>(
        &self,
        draft: &mut Draft,
        phase: Phase,
        hours: u32,
        rng: &mut R,
    ) -> Option<Track> {
        let request = SelectionRequest {
            catalog: self.catalog,
            prev: draft.tracks.last(),
            phase,
            used: &draft.used,
            hours,
            recent_keys: &draft.recent_keys,
        };
        find_next(&request, &mut draft.state, self.config, rng)
    }

    /// Build a fresh set for `hours`, optionally opening with the first
    /// track whose "artist - title" contains `start`.
    ///
    /// The result matches the picked template's length unless the catalog
    /// runs dry, in which case it is shorter.
    pub fn generate<R: Rng + ?Sized>(&self, hours: u32, start: Option<&str>, rng: &mut R) -> Vec<Track> {
        let template = phase::pick_template(hours, rng);
        let Some((&first_phase, rest)) = template.split_first() else {
            return Vec::new();
        };
        let Some(first) = self.pick_first(first_phase, start, rng) else {
            warn!("Catalog is empty, nothing to generate");
            return Vec::new();
        };
        info!("Opening {}h set with {first} [{}]", phase::duration_bucket(hours), first.key);

        let mut draft = Draft::from_prefix(vec![first]);
        for &phase in rest {
            let chosen = match self.select(&mut draft, phase, hours, rng) {
                Some(track) => Some(track),
                None => self.fallback(&mut draft, phase, hours, rng),
            };
            match chosen {
                Some(track) => draft.push(track),
                None => {
                    warn!("Catalog exhausted at slot {} ({phase})", draft.tracks.len() + 1);
                    break;
                }
            }
        }

        let mut tracks = draft.tracks;
        tracks.truncate(template.len());
        if tracks.len() < template.len() {
            warn!("Generated {} of {} slots", tracks.len(), template.len());
        }
        tracks
    }

    fn pick_first<R: Rng + ?Sized>(&self, phase: Phase, start: Option<&str>, rng: &mut R) -> Option<Track> {
        let needle = start.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        if let Some(needle) = needle {
            if let Some(track) = self.catalog.iter().find(|t| t.identity().contains(&needle)) {
                return Some(track.staged(phase));
            }
            debug!("No track matches '{needle}', opening at random");
        }

        let eligible: Vec<&Track> = self
            .catalog
            .iter()
            .filter(|t| filter::is_eligible(t, phase, 1))
            .collect();
        let pool: Vec<&Track> = if eligible.is_empty() {
            self.catalog.iter().collect()
        } else {
            eligible
        };
        pool.choose(rng).map(|t| t.staged(phase))
    }

    /// Random relaxed-eligibility pick that ignores harmonic scoring but
    /// still avoids a third identical key and fifths beyond the budget.
    fn fallback<R: Rng + ?Sized>(
        &self,
        draft: &mut Draft,
        phase: Phase,
        hours: u32,
        rng: &mut R,
    ) -> Option<Track> {
        let prev_key = draft.tracks.last().map(|t| t.key.clone()).unwrap_or_default();
        let fifths_exhausted = draft.state.fifths_exhausted(hours);
        let pool: Vec<&Track> = self
            .catalog
            .iter()
            .filter(|t| {
                !draft.used.contains(&t.identity())
                    && filter::is_eligible(t, phase, 2)
                    && !draft.state.repeats_twice(&t.key)
                    && !(fifths_exhausted && crate::key::relation(&prev_key, &t.key) == Relation::Fifth)
            })
            .collect();

        let chosen = pool.choose(rng)?.staged(phase);
        debug!("{phase}: fallback pick {chosen} [{}] from {} tracks", chosen.key, pool.len());
        draft.state.record(&prev_key, &chosen.key, Some(phase));
        Some(chosen)
    }

    /// Rebuild a set around the tracks flagged `locked` in `setlist`.
    ///
    /// Locked tracks keep their order and content and open the set
    /// (truncated to the template length); the remaining slots are filled
    /// from the last of them. Filling stops at the first slot with no
    /// compatible candidate.
    pub fn generate_locked<R: Rng + ?Sized>(&self, hours: u32, setlist: &[Track], rng: &mut R) -> Vec<Track> {
        let template = phase::pick_template(hours, rng);
        let locked: Vec<Track> = setlist
            .iter()
            .filter(|t| t.locked)
            .take(template.len())
            .cloned()
            .collect();
        info!("Regenerating {}h set around {} locked tracks", phase::duration_bucket(hours), locked.len());

        let mut draft = Draft::from_prefix(locked);
        for &phase in &template[draft.tracks.len()..] {
            match self.select(&mut draft, phase, hours, rng) {
                Some(track) => draft.push(track),
                None => {
                    warn!("No compatible track for slot {} ({phase}), stopping", draft.tracks.len() + 1);
                    break;
                }
            }
        }
        draft.tracks
    }

    /// Find a replacement for `setlist[index]`, mixing from the track before it.
    ///
    /// # Errors
    ///
    /// [`ReplaceError::OutOfRange`] for an index past the end,
    /// [`ReplaceError::FirstSlot`] for index 0, and
    /// [`ReplaceError::NoCandidate`] when nothing compatible is left.
    pub fn replace_slot<R: Rng + ?Sized>(
        &self,
        setlist: &[Track],
        index: usize,
        rng: &mut R,
    ) -> Result<Track, ReplaceError> {
        if index >= setlist.len() {
            return Err(ReplaceError::OutOfRange { index, len: setlist.len() });
        }
        if index == 0 {
            return Err(ReplaceError::FirstSlot);
        }

        let phase = setlist[index].stage.unwrap_or(Phase::Warmup);
        let used: HashSet<String> = setlist.iter().map(Track::identity).collect();
        let mut state = SelectionState::replayed(&setlist[index.saturating_sub(2)..index]);
        let request = SelectionRequest {
            catalog: self.catalog,
            prev: Some(&setlist[index - 1]),
            phase,
            used: &used,
            hours: REPLACEMENT_HOURS,
            recent_keys: &[],
        };

        find_next(&request, &mut state, self.config, rng).ok_or(ReplaceError::NoCandidate { index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_catalog() -> Vec<Track> {
        vec![
            Track::new("A", "Warm 8A", 118.0, "8A", 3),
            Track::new("B", "Warm 7A", 117.0, "7A", 2),
            Track::new("C", "Build 9A", 120.0, "9A", 5),
            Track::new("D", "Build 8B", 121.0, "8B", 5),
        ]
    }

    #[test]
    fn test_start_title_match() {
        let catalog = small_catalog();
        let config = ScoringConfig::default();
        let generator = SetlistGenerator::new(&catalog, &config);
        let set = generator.generate(1, Some("build 8b"), &mut StdRng::seed_from_u64(2));
        assert_eq!(set[0].title, "Build 8B");
        assert_eq!(set[0].stage, Some(Phase::Warmup));
    }

    #[test]
    fn test_empty_catalog() {
        let config = ScoringConfig::default();
        let generator = SetlistGenerator::new(&[], &config);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generator.generate(2, None, &mut rng).is_empty());
        assert!(generator.generate_locked(2, &[], &mut rng).is_empty());
    }

    #[test]
    fn test_generation_never_repeats_a_track() {
        let catalog = small_catalog();
        let config = ScoringConfig::default();
        let generator = SetlistGenerator::new(&catalog, &config);
        for seed in 0..25 {
            let set = generator.generate(1, None, &mut StdRng::seed_from_u64(seed));
            let ids: HashSet<String> = set.iter().map(Track::identity).collect();
            assert_eq!(ids.len(), set.len());
            assert!(set.len() <= catalog.len());
        }
    }

    #[test]
    fn test_replace_rejects_first_and_out_of_range() {
        let catalog = small_catalog();
        let config = ScoringConfig::default();
        let generator = SetlistGenerator::new(&catalog, &config);
        let set = vec![catalog[0].staged(Phase::Warmup), catalog[1].staged(Phase::Warmup)];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(generator.replace_slot(&set, 0, &mut rng), Err(ReplaceError::FirstSlot));
        assert_eq!(
            generator.replace_slot(&set, 2, &mut rng),
            Err(ReplaceError::OutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            generator.replace_slot(&[], 0, &mut rng),
            Err(ReplaceError::OutOfRange { index: 0, len: 0 })
        );
    }

    #[test]
    fn test_replace_picks_unused_compatible_track() {
        let catalog = small_catalog();
        let config = ScoringConfig::default();
        let generator = SetlistGenerator::new(&catalog, &config);
        let set = vec![catalog[0].staged(Phase::Warmup), catalog[1].staged(Phase::Build)];
        let replacement = generator.replace_slot(&set, 1, &mut StdRng::seed_from_u64(4)).unwrap();
        assert!(["Build 9A", "Build 8B"].contains(&replacement.title.as_str()));
        assert_eq!(replacement.stage, Some(Phase::Build));
    }

    #[test]
    fn test_replace_reports_no_candidate() {
        let catalog = small_catalog();
        let config = ScoringConfig::default();
        let generator = SetlistGenerator::new(&catalog, &config);
        let set = vec![catalog[0].staged(Phase::Warmup), catalog[1].staged(Phase::Driving)];
        assert_eq!(
            generator.replace_slot(&set, 1, &mut StdRng::seed_from_u64(4)),
            Err(ReplaceError::NoCandidate { index: 1 })
        );
    }

    #[test]
    fn test_locked_prefix_is_kept_verbatim() {
        let catalog = small_catalog();
        let config = ScoringConfig::default();
        let generator = SetlistGenerator::new(&catalog, &config);
        let mut locked = catalog[1].staged(Phase::Warmup);
        locked.locked = true;
        let unlocked = catalog[0].staged(Phase::Warmup);
        let set = generator.generate_locked(1, &[unlocked, locked.clone()], &mut StdRng::seed_from_u64(8));
        assert_eq!(set[0], locked);
        assert!(set[1..].iter().all(|t| !t.locked));
    }

    #[test]
    fn test_unlocked_regeneration_never_triples_a_key() {
        let catalog: Vec<Track> = [(117.0, 2), (120.0, 5), (122.0, 7)]
            .into_iter()
            .flat_map(|(bpm, energy)| (0..4).map(move |i| Track::new("Solo", &format!("{bpm} #{i}"), bpm, "8A", energy)))
            .collect();
        let config = ScoringConfig::default();
        let generator = SetlistGenerator::new(&catalog, &config);
        for seed in 0..20 {
            let set = generator.generate_locked(1, &[], &mut StdRng::seed_from_u64(seed));
            assert!(!set.is_empty());
            assert!(set.windows(3).all(|w| !(w[0].key == w[1].key && w[1].key == w[2].key)), "seed {seed}");
        }
    }
}
