//! Harmonic-mixing DJ setlist generation.
//!
//! Given a catalog of tracks annotated with tempo, Camelot key and energy,
//! mixset builds ordered sets that follow an energy curve for the requested
//! duration while keeping every transition harmonically compatible.
//!
//! Core modules:
//! - [`key`] - Camelot wheel notation and transition relations
//! - [`phase`] - Energy phases, their constraints and per-duration templates
//! - [`filter`] - Track eligibility for a phase
//! - [`algorithm`] - Stateful candidate scoring and selection
//! - [`setlist`] - Fresh, locked-aware and single-slot generation flows
//!
//! ### Supporting Modules
//!
//! - [`track`] - Catalog record model
//! - [`db`] - Catalog storage (JSON file or SQLite) with an in-memory snapshot
//! - [`analysis`] - Energy curve, key wheel, transition audits and simulation
//! - [`config`] - Data directory, config file and scoring overrides
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use mixset::config::RuntimeConfig;
//! use mixset::setlist::SetlistGenerator;
//! use mixset::analysis;
//!
//! let config = RuntimeConfig::load(None, None);
//! let catalog = config.open_catalog();
//! let tracks = catalog.load();
//!
//! let generator = SetlistGenerator::new(&tracks, &config.scoring);
//! let set = generator.generate(2, Some("Lamur"), &mut rand::thread_rng());
//! for (i, track) in set.iter().enumerate() {
//!     println!("{:>2}. [{}] {} {}", i + 1, track.key, track, track.stage.map(|p| p.label()).unwrap_or("-"));
//! }
//!
//! let report = analysis::transition_report(&set, 2);
//! println!("{} fifth jumps of {} allowed", report.fifths, report.fifth_budget);
//!
//! // Swap the fifth track for another compatible one
//! let replacement = generator.replace_slot(&set, 4, &mut rand::thread_rng())?;
//! println!("Try {replacement} instead");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Selection Details
//!
//! Each slot is filled from the unused tracks that fit the slot's phase
//! (tempo, energy and key set), retried once with wider tempo and energy
//! margins. Candidates are classified against the previous key:
//!
//! - `same`, `switch`, `up`, `down` and `fifth` transitions are legal
//! - anything else is discarded
//!
//! Survivors are scored from a random base plus bonuses and penalties that
//! favour moving around the wheel, limit fifth jumps per set, and avoid
//! bouncing between the two modes of one position. The winner is drawn at
//! random from the top tenth of the ranking.
//!
//! All constants live in [`algorithm::ScoringConfig`] and can be overridden
//! from the config file.

pub mod algorithm;
pub mod analysis;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod filter;
pub mod key;
pub mod phase;
pub mod setlist;
pub mod track;
