//! Candidate scoring and selection for the next slot of a set.
//!
//! Every selection is driven by an explicit [`SelectionState`] owned by the
//! caller. A generation run creates one state, threads it through each
//! [`find_next`] call and drops it at the end; nothing is shared between
//! runs.

use crate::filter;
use crate::key::{CamelotKey, Mode, Relation, SwitchPair};
use crate::phase::Phase;
use crate::track::Track;
use log::{debug, trace};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Tunable scoring constants. Every field can be overridden from the
/// configuration file; omitted fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Base score is drawn uniformly from `[base_min, base_max)`.
    pub base_min: f64,
    pub base_max: f64,
    /// How many of the most recent set keys count as "recent".
    pub recent_key_window: usize,
    pub recent_key_penalty: f64,
    pub repeat_previous_penalty: f64,
    /// Tracks that must pass after a fifth jump before another is welcome.
    pub fifth_cooldown: u32,
    pub fifth_early_penalty: f64,
    pub fifth_bonus: f64,
    pub same_first_bonus: f64,
    pub same_second_bonus: f64,
    pub same_excess_penalty: f64,
    pub up_bonus: f64,
    /// Extra `up` bonus once a switch pair has recurred this often.
    pub up_switch_fatigue_threshold: u32,
    pub up_switch_fatigue_bonus: f64,
    pub down_bonus: f64,
    pub switch_bonus: f64,
    pub switch_repeat_penalty: f64,
    /// A switch pair may not be used again once it has recurred this often.
    pub max_switch_pair_uses: u32,
    pub major_lift_bonus: f64,
    pub minor_warmup_bonus: f64,
    /// Fraction of the ranked candidates the winner is sampled from.
    pub top_fraction: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_min: 20.0,
            base_max: 40.0,
            recent_key_window: 5,
            recent_key_penalty: 500.0,
            repeat_previous_penalty: 200.0,
            fifth_cooldown: 10,
            fifth_early_penalty: 300.0,
            fifth_bonus: 100.0,
            same_first_bonus: 40.0,
            same_second_bonus: 20.0,
            same_excess_penalty: 300.0,
            up_bonus: 200.0,
            up_switch_fatigue_threshold: 2,
            up_switch_fatigue_bonus: 100.0,
            down_bonus: 120.0,
            switch_bonus: 180.0,
            switch_repeat_penalty: 80.0,
            max_switch_pair_uses: 2,
            major_lift_bonus: 150.0,
            minor_warmup_bonus: 80.0,
            top_fraction: 0.10,
        }
    }
}

/// Fifth jumps tolerated in a set of the given length.
#[must_use]
pub fn max_fifths_allowed(hours: u32) -> u32 {
    match hours {
        0 | 1 => 1,
        2 => 2,
        h => (3 + (h - 3)).min(4),
    }
}

/// Mutable bookkeeping for one generation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub last_phase: Option<Phase>,
    /// Consecutive `same` transitions within the current phase.
    pub repeat_count: u32,
    pub tracks_since_fifth: u32,
    pub fifth_count: u32,
    /// The last two keys placed, oldest first.
    pub last_two_keys: VecDeque<String>,
    pub switch_pair: Option<SwitchPair>,
    pub switch_pair_count: u32,
}

impl SelectionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build state as if `prefix` had been placed by this run, so that a
    /// fixed prefix counts toward repetition and fifth-jump limits.
    #[must_use]
    pub fn replayed(prefix: &[Track]) -> Self {
        let mut state = Self::new();
        let mut prev: Option<&Track> = None;
        for track in prefix {
            match prev {
                Some(p) => state.record(&p.key, &track.key, track.stage),
                None => state.push_key(&track.key),
            }
            prev = Some(track);
        }
        state
    }

    /// Would placing `key` make three identical keys in a row?
    #[must_use]
    pub fn repeats_twice(&self, key: &str) -> bool {
        self.last_two_keys.len() == 2 && self.last_two_keys.iter().all(|k| k == key)
    }

    /// Has the fifth-jump budget for a set of `hours` been used up?
    #[must_use]
    pub fn fifths_exhausted(&self, hours: u32) -> bool {
        self.fifth_count >= max_fifths_allowed(hours)
    }

    fn push_key(&mut self, key: &str) {
        self.last_two_keys.push_back(key.to_string());
        while self.last_two_keys.len() > 2 {
            self.last_two_keys.pop_front();
        }
    }

    fn enter_phase(&mut self, phase: Option<Phase>) {
        if self.last_phase != phase {
            self.repeat_count = 0;
            self.last_phase = phase;
        }
    }

    /// Account for a track with `key` placed after one with `prev_key`.
    pub fn record(&mut self, prev_key: &str, key: &str, phase: Option<Phase>) {
        self.enter_phase(phase);
        self.push_key(key);

        let parsed = CamelotKey::parse(prev_key).zip(CamelotKey::parse(key));
        let rel = parsed.map_or(Relation::Invalid, |(a, b)| a.relation_to(b));
        let pair = parsed.and_then(|(a, b)| a.switch_pair(b));

        match (rel, pair) {
            (Relation::Switch, Some(pair)) if self.switch_pair == Some(pair) => {
                self.switch_pair_count += 1;
            }
            (Relation::Switch, Some(pair)) => {
                self.switch_pair = Some(pair);
                self.switch_pair_count = 1;
            }
            _ => {
                self.switch_pair = None;
                self.switch_pair_count = 0;
            }
        }

        if rel == Relation::Fifth {
            self.tracks_since_fifth = 0;
            self.fifth_count += 1;
        } else {
            self.tracks_since_fifth += 1;
        }

        if key == prev_key {
            self.repeat_count += 1;
        } else {
            self.repeat_count = 0;
        }
    }
}

/// Everything [`find_next`] needs besides the mutable state and randomness.
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    pub catalog: &'a [Track],
    pub prev: Option<&'a Track>,
    pub phase: Phase,
    /// Identities already placed in the set.
    pub used: &'a HashSet<String>,
    pub hours: u32,
    /// Keys placed so far, oldest first.
    pub recent_keys: &'a [String],
}

/// Score one candidate against the previous key, or `None` if it is ruled out.
fn score_candidate<R: Rng + ?Sized>(
    prev_key: CamelotKey,
    candidate: &Track,
    request: &SelectionRequest<'_>,
    state: &SelectionState,
    config: &ScoringConfig,
    rng: &mut R,
) -> Option<f64> {
    let key = candidate.camelot()?;
    let rel = prev_key.relation_to(key);
    if !rel.is_valid() || state.repeats_twice(&candidate.key) {
        return None;
    }

    let pair = prev_key.switch_pair(key);
    let same_pair = pair.is_some() && state.switch_pair == pair;
    if rel == Relation::Switch && same_pair && state.switch_pair_count >= config.max_switch_pair_uses {
        return None;
    }

    if let (Some(step_max), Some(prev_bpm), Some(bpm)) = (
        request.phase.config().bpm_step_max,
        request.prev.and_then(Track::tempo),
        candidate.tempo(),
    ) {
        if (bpm - prev_bpm).abs() > step_max {
            return None;
        }
    }

    let mut score = if config.base_max > config.base_min {
        rng.gen_range(config.base_min..config.base_max)
    } else {
        config.base_min
    };

    let window_start = request.recent_keys.len().saturating_sub(config.recent_key_window);
    if request.recent_keys[window_start..].contains(&candidate.key) {
        score -= config.recent_key_penalty;
    }
    if key == prev_key {
        score -= config.repeat_previous_penalty;
    }

    match rel {
        Relation::Fifth => {
            if state.fifths_exhausted(request.hours) {
                return None;
            }
            if state.tracks_since_fifth < config.fifth_cooldown {
                score -= config.fifth_early_penalty;
            } else {
                score += config.fifth_bonus;
            }
        }
        Relation::Same => {
            score += match state.repeat_count {
                0 => config.same_first_bonus,
                1 => config.same_second_bonus,
                _ => -config.same_excess_penalty,
            };
        }
        Relation::Up => {
            score += config.up_bonus;
            if state.switch_pair_count >= config.up_switch_fatigue_threshold {
                score += config.up_switch_fatigue_bonus;
            }
        }
        Relation::Down => score += config.down_bonus,
        Relation::Switch => {
            score += config.switch_bonus;
            if same_pair && state.switch_pair_count >= 1 {
                score -= config.switch_repeat_penalty;
            }
        }
        Relation::Invalid => return None,
    }

    if matches!(request.phase, Phase::Build | Phase::MidPeak)
        && prev_key.mode() == Mode::A
        && key.mode() == Mode::B
    {
        score += config.major_lift_bonus;
    }
    if matches!(request.phase, Phase::Warmup | Phase::Build) && key.mode() == Mode::A {
        score += config.minor_warmup_bonus;
    }

    Some(score)
}

/// Size of the top slice the winner is drawn from.
#[must_use]
pub fn top_slice_len(ranked: usize, fraction: f64) -> usize {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let len = (ranked as f64 * fraction).ceil() as usize;
    len.clamp(1, ranked.max(1))
}

/// Pick the next track for `request.phase`, updating `state` with the winner.
///
/// Returns `None` when no unused track fits the phase even on the relaxed
/// attempt, or when every fitting track is ruled out harmonically.
pub fn find_next<R: Rng + ?Sized>(
    request: &SelectionRequest<'_>,
    state: &mut SelectionState,
    config: &ScoringConfig,
    rng: &mut R,
) -> Option<Track> {
    let candidates = filter::eligible_candidates(request.catalog, request.phase, |t| {
        !request.used.contains(&t.identity())
    });
    if candidates.is_empty() {
        debug!("No eligible candidates for {}", request.phase);
        return None;
    }

    let Some(prev) = request.prev else {
        let first = candidates.choose(rng)?.staged(request.phase);
        state.enter_phase(Some(request.phase));
        state.push_key(&first.key);
        debug!("{}: opening with {first} [{}]", request.phase, first.key);
        return Some(first);
    };

    let Some(prev_key) = prev.camelot() else {
        debug!("Previous track '{prev}' has no usable key '{}'", prev.key);
        return None;
    };

    state.enter_phase(Some(request.phase));

    let mut scored: Vec<(f64, &Track)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let score = score_candidate(prev_key, candidate, request, state, config, rng)?;
            trace!("  {score:>8.2}  {candidate} [{}]", candidate.key);
            Some((score, candidate))
        })
        .collect();

    if scored.is_empty() {
        debug!("Every candidate for {} is harmonically ruled out after {prev_key}", request.phase);
        return None;
    }

    scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let top = top_slice_len(scored.len(), config.top_fraction);
    let (score, winner) = scored[..top].choose(rng)?;

    state.record(&prev.key, &winner.key, Some(request.phase));
    debug!(
        "{}: {winner} [{}] {} from {prev_key} (score {score:.1}, top {top}/{})",
        request.phase,
        winner.key,
        prev_key.relation_to(winner.camelot()?),
        scored.len()
    );

    Some(winner.staged(request.phase))
}
