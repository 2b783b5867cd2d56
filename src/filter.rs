//! Eligibility of a track for a phase.
//!
//! The first attempt is strict. Any later attempt widens tempo by 2 BPM and
//! energy by 1 on each side; the key set never widens.

use crate::phase::Phase;
use crate::track::Track;

/// Tolerances applied on top of a phase's ranges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub bpm: f64,
    pub energy: i64,
}

impl Margins {
    #[must_use]
    pub const fn for_attempt(attempt: u32) -> Self {
        if attempt > 1 {
            Self { bpm: 2.0, energy: 1 }
        } else {
            Self { bpm: 0.0, energy: 0 }
        }
    }
}

/// Does `track` fit `phase` on the given attempt?
///
/// Tracks with non-numeric tempo or energy never fit.
#[must_use]
pub fn is_eligible(track: &Track, phase: Phase, attempt: u32) -> bool {
    let config = phase.config();
    let (Some(bpm), Some(energy)) = (track.tempo(), track.energy_level()) else {
        return false;
    };
    let margins = Margins::for_attempt(attempt);

    let bpm_ok = (config.bpm.0 - margins.bpm) <= bpm && bpm <= (config.bpm.1 + margins.bpm);
    let key_ok = track.camelot().is_some_and(|key| config.keys.contains(&key));
    let energy_ok =
        (config.energy.0 - margins.energy) <= energy && energy <= (config.energy.1 + margins.energy);

    bpm_ok && key_ok && energy_ok
}

/// Label-based variant for callers holding a raw phase label.
///
/// Unrecognized labels impose no constraint.
#[must_use]
pub fn is_eligible_for_label(track: &Track, label: &str, attempt: u32) -> bool {
    match Phase::from_label(label) {
        Some(phase) => is_eligible(track, phase, attempt),
        None => true,
    }
}

/// Tracks not yet used that fit the phase, escalating to the relaxed
/// attempt when the strict pass finds nothing.
pub fn eligible_candidates<'a, F>(tracks: &'a [Track], phase: Phase, is_unused: F) -> Vec<&'a Track>
where
    F: Fn(&Track) -> bool,
{
    for attempt in 1..=2 {
        let candidates: Vec<&Track> = tracks
            .iter()
            .filter(|t| is_unused(t) && is_eligible(t, phase, attempt))
            .collect();
        if !candidates.is_empty() {
            if attempt > 1 {
                log::debug!("Relaxed eligibility for {phase}: {} candidates", candidates.len());
            }
            return candidates;
        }
    }
    Vec::new()
}
