//! Set analysis: chart data for a finished setlist, a transition audit, and
//! a batch simulator used for tuning [`ScoringConfig`].

use crate::algorithm::{max_fifths_allowed, ScoringConfig};
use crate::key::{relation, CamelotKey, Relation};
use crate::phase;
use crate::setlist::SetlistGenerator;
use crate::track::Track;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Energy plotted for a slot with no stage.
pub const UNTAGGED_ENERGY: u8 = 5;

/// Nominal energy per slot, labelled `#1`, `#2`, ...
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnergyCurve {
    pub labels: Vec<String>,
    pub energy: Vec<u8>,
}

#[must_use]
pub fn energy_curve(setlist: &[Track]) -> EnergyCurve {
    EnergyCurve {
        labels: (1..=setlist.len()).map(|i| format!("#{i}")).collect(),
        energy: setlist
            .iter()
            .map(|t| t.stage.map_or(UNTAGGED_ENERGY, phase::Phase::nominal_energy))
            .collect(),
    }
}

/// Key usage of a setlist against the full wheel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyWheel {
    pub key_counts: BTreeMap<String, usize>,
    pub key_sequence: Vec<String>,
    pub all_keys: Vec<String>,
}

#[must_use]
pub fn key_wheel(setlist: &[Track]) -> KeyWheel {
    let key_sequence: Vec<String> = setlist.iter().map(|t| t.key.clone()).collect();
    let mut key_counts = BTreeMap::new();
    for key in &key_sequence {
        *key_counts.entry(key.clone()).or_insert(0) += 1;
    }
    KeyWheel {
        key_counts,
        key_sequence,
        all_keys: CamelotKey::all().iter().map(ToString::to_string).collect(),
    }
}

/// Audit of the transitions in one setlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    pub length: usize,
    pub relations: BTreeMap<Relation, usize>,
    pub fifths: usize,
    pub fifth_budget: u32,
    /// Positions where a key is played a third time in a row.
    pub triple_repeats: Vec<usize>,
    pub duplicate_tracks: usize,
}

impl TransitionReport {
    #[must_use]
    pub fn invalid_transitions(&self) -> usize {
        self.relations.get(&Relation::Invalid).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn over_budget(&self) -> bool {
        self.fifths > self.fifth_budget as usize
    }

    /// No invalid transitions, triple repeats, duplicates or fifth overruns.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.invalid_transitions() == 0
            && self.triple_repeats.is_empty()
            && self.duplicate_tracks == 0
            && !self.over_budget()
    }
}

#[must_use]
pub fn transition_report(setlist: &[Track], hours: u32) -> TransitionReport {
    let mut relations = BTreeMap::new();
    for pair in setlist.windows(2) {
        *relations.entry(relation(&pair[0].key, &pair[1].key)).or_insert(0) += 1;
    }
    let triple_repeats = setlist
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[0].key == w[1].key && w[1].key == w[2].key)
        .map(|(i, _)| i + 2)
        .collect();
    let unique: HashSet<String> = setlist.iter().map(Track::identity).collect();

    TransitionReport {
        length: setlist.len(),
        fifths: relations.get(&Relation::Fifth).copied().unwrap_or(0),
        relations,
        fifth_budget: max_fifths_allowed(hours),
        triple_repeats,
        duplicate_tracks: setlist.len() - unique.len(),
    }
}

/// Aggregate of many simulated generations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub runs: usize,
    pub hours: u32,
    pub mean_length: f64,
    pub min_length: usize,
    pub max_length: usize,
    /// Runs shorter than the shortest template for the duration.
    pub short_sets: usize,
    pub relations: BTreeMap<Relation, usize>,
    pub triple_repeats: usize,
    pub budget_overruns: usize,
    pub duplicate_tracks: usize,
}

/// Generate `runs` sets in parallel, run `i` seeded with `seed + i`, and
/// aggregate their transition reports.
#[must_use]
pub fn simulate(tracks: &[Track], hours: u32, runs: usize, seed: u64, config: &ScoringConfig) -> SimulationSummary {
    let generator = SetlistGenerator::new(tracks, config);
    let reports: Vec<TransitionReport> = (0..runs)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let set = generator.generate(hours, None, &mut rng);
            transition_report(&set, hours)
        })
        .collect();

    let shortest_template = phase::templates(hours).iter().map(Vec::len).min().unwrap_or(0);
    let mut relations = BTreeMap::new();
    for report in &reports {
        for (rel, count) in &report.relations {
            *relations.entry(*rel).or_insert(0) += count;
        }
    }
    let total: usize = reports.iter().map(|r| r.length).sum();

    #[allow(clippy::cast_precision_loss)]
    let mean_length = if runs == 0 { 0.0 } else { total as f64 / runs as f64 };

    let summary = SimulationSummary {
        runs,
        hours: phase::duration_bucket(hours),
        mean_length,
        min_length: reports.iter().map(|r| r.length).min().unwrap_or(0),
        max_length: reports.iter().map(|r| r.length).max().unwrap_or(0),
        short_sets: reports.iter().filter(|r| r.length < shortest_template).count(),
        relations,
        triple_repeats: reports.iter().map(|r| r.triple_repeats.len()).sum(),
        budget_overruns: reports.iter().filter(|r| r.over_budget()).count(),
        duplicate_tracks: reports.iter().map(|r| r.duplicate_tracks).sum(),
    };
    info!(
        "Simulated {runs} {}h sets: mean length {:.1}, {} short",
        summary.hours, summary.mean_length, summary.short_sets
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    fn staged(key: &str, phase: Phase, title: &str) -> Track {
        Track::new("Artist", title, 120.0, key, 5).staged(phase)
    }

    #[test]
    fn test_energy_curve() {
        let mut set = vec![staged("8A", Phase::Warmup, "a"), staged("8A", Phase::PeakTime, "b")];
        set.push(Track::new("Artist", "c", 120.0, "8A", 5));
        let curve = energy_curve(&set);
        assert_eq!(curve.labels, ["#1", "#2", "#3"]);
        assert_eq!(curve.energy, [3, 9, 5]);
    }

    #[test]
    fn test_key_wheel() {
        let set = vec![staged("8A", Phase::Warmup, "a"), staged("8A", Phase::Build, "b"), staged("9A", Phase::Build, "c")];
        let wheel = key_wheel(&set);
        assert_eq!(wheel.key_counts["8A"], 2);
        assert_eq!(wheel.key_sequence, ["8A", "8A", "9A"]);
        assert_eq!(wheel.all_keys.len(), 24);
        assert_eq!(wheel.all_keys[0], "12A");
        assert_eq!(wheel.all_keys[12], "12B");
    }

    #[test]
    fn test_transition_report_flags_problems() {
        let set = vec![
            staged("8A", Phase::Warmup, "a"),
            staged("8A", Phase::Warmup, "b"),
            staged("8A", Phase::Warmup, "c"),
            staged("1A", Phase::Build, "d"),
            staged("3A", Phase::Build, "e"),
            staged("3A", Phase::Build, "a"),
        ];
        let report = transition_report(&set, 1);
        assert_eq!(report.triple_repeats, [2]);
        assert_eq!(report.fifths, 1);
        assert_eq!(report.invalid_transitions(), 1);
        assert_eq!(report.duplicate_tracks, 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_empty_setlist_report() {
        let report = transition_report(&[], 3);
        assert_eq!(report.length, 0);
        assert_eq!(report.fifth_budget, 3);
        assert!(report.is_clean());
    }

    #[test]
    fn test_simulate_is_reproducible() {
        let tracks: Vec<Track> = ["8A", "7A", "9A", "8B", "6A", "10A"]
            .iter()
            .enumerate()
            .map(|(i, key)| Track::new("Artist", &format!("t{i}"), 118.0, key, 3))
            .collect();
        let config = ScoringConfig::default();
        let a = simulate(&tracks, 1, 16, 42, &config);
        let b = simulate(&tracks, 1, 16, 42, &config);
        assert_eq!(a, b);
        assert_eq!(a.runs, 16);
        assert_eq!(a.duplicate_tracks, 0);
        assert_eq!(a.triple_repeats, 0);
        assert!(a.max_length <= tracks.len());
    }
}
