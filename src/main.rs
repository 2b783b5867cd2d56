//! # Mixset - Harmonic-Mixing Setlist Generator
//!
//! Command-line front end over the `mixset` library. Every command resolves
//! the catalog from `--catalog`, `MIXSET_CATALOG`, the config file, or the
//! platform data directory, in that order.
//!
//! ## Usage
//!
//! ```bash
//! # Load a catalog exported from your DJ software
//! mixset import ~/exports/tracks.json
//!
//! # Two hour set opening with a specific track
//! mixset generate -H 2 --start "Guy J - Lamur" --out set.json
//!
//! # Lock favourites in set.json ("isLocked": true), then rebuild around them
//! mixset regenerate set.json -H 2
//!
//! # Audit a set
//! mixset report set.json -H 2
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use mixset::cli::{self, Command, OutputArgs};
use mixset::config::RuntimeConfig;
use mixset::key::{normalize_key, relation, CamelotKey};
use mixset::phase::Phase;
use mixset::setlist::SetlistGenerator;
use mixset::track::{Preview, Track};
use mixset::{analysis, completion, db};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

/// Main entry point for the mixset application.
///
/// # Logging
///
/// Initializes environment logger which can be controlled via `RUST_LOG`:
/// - `RUST_LOG=debug mixset generate` - Per-slot selection decisions
/// - `RUST_LOG=mixset::algorithm=trace mixset generate` - Every candidate score
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let config = RuntimeConfig::load(args.catalog.as_deref(), args.backend);
    debug!("Runtime config: {config:?}");

    match args.command {
        Command::Generate { hours, start, seed, output } => {
            let catalog = config.open_catalog();
            let tracks = catalog.load();
            let generator = SetlistGenerator::new(&tracks, &config.scoring);
            let set = generator.generate(hours, start.as_deref(), &mut make_rng(seed));
            info!("Generated {} tracks for a {hours}h set", set.len());
            emit_setlist(&set, &output)?;
        }
        Command::Regenerate { setlist, hours, seed, output } => {
            let previous = read_setlist(&setlist)?;
            let catalog = config.open_catalog();
            let tracks = catalog.load();
            let generator = SetlistGenerator::new(&tracks, &config.scoring);
            let set = generator.generate_locked(hours, &previous, &mut make_rng(seed));
            emit_setlist(&set, &output)?;
        }
        Command::Replace { setlist, index, seed, in_place, output } => {
            let mut set = read_setlist(&setlist)?;
            let catalog = config.open_catalog();
            let tracks = catalog.load();
            let generator = SetlistGenerator::new(&tracks, &config.scoring);
            let replacement = generator
                .replace_slot(&set, index, &mut make_rng(seed))
                .with_context(|| format!("Cannot replace slot {index} of {}", setlist.display()))?;
            info!("Slot {index}: {} -> {replacement}", set[index]);
            set[index] = replacement;

            if in_place {
                write_setlist(&setlist, &set)?;
            }
            emit_setlist(&set, &output)?;
        }
        Command::Search { query, phase, page, json } => {
            let phase = phase.map(|p| p.parse::<Phase>()).transpose()?;
            let catalog = config.open_catalog();
            let results = catalog.search(&query, phase, page);
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for track in &results.tracks {
                    println!("{}", track_row(track));
                }
                println!(
                    "-- page {} ({} matches{})",
                    results.page,
                    results.total,
                    if results.has_more { ", more with --page" } else { "" }
                );
            }
        }
        Command::Key { key } => match key {
            Some(raw) => {
                let key: CamelotKey = raw.parse()?;
                println!("{raw} -> {key}");
                for other in CamelotKey::all() {
                    let rel = key.relation_to(other);
                    if rel.is_valid() && other != key {
                        println!("  {rel:<6} {other}");
                    }
                }
            }
            None => {
                let names: Vec<String> = CamelotKey::all().iter().map(ToString::to_string).collect();
                println!("{}", names.join(" "));
            }
        },
        Command::Relation { from, to } => {
            let (from, to) = (normalize_key(&from), normalize_key(&to));
            println!("{from} -> {to}: {}", relation(&from, &to));
        }
        Command::Report { setlist, hours, json } => {
            let set = read_setlist(&setlist)?;
            print_report(&set, hours, json)?;
        }
        Command::Simulate { hours, runs, seed, json } => {
            let catalog = config.open_catalog();
            let tracks = catalog.load();
            let summary = analysis::simulate(&tracks, hours, runs, seed, &config.scoring);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{runs} runs of {}h over {} tracks", summary.hours, tracks.len());
                println!(
                    "  length: mean {:.1}, min {}, max {} ({} short)",
                    summary.mean_length, summary.min_length, summary.max_length, summary.short_sets
                );
                for (rel, count) in &summary.relations {
                    println!("  {rel:<8} {count}");
                }
                println!(
                    "  triple repeats {}, fifth overruns {}, duplicates {}",
                    summary.triple_repeats, summary.budget_overruns, summary.duplicate_tracks
                );
            }
        }
        Command::Import { file } => {
            let catalog = config.open_catalog();
            let count = catalog.import(&file)?;
            println!("Imported {count} tracks into {}", catalog.describe());
        }
        Command::Preview { artist, title, spotify, youtube } => {
            let preview = match (spotify, youtube) {
                (Some(id), _) => Preview::Spotify(id),
                (None, Some(id)) => Preview::Youtube(id),
                (None, None) => anyhow::bail!("Give --spotify or --youtube"),
            };
            let catalog = config.open_catalog();
            if !catalog.record_preview(&artist, &title, preview)? {
                anyhow::bail!("No track '{artist} - {title}' in {}", catalog.describe());
            }
            println!("Saved preview for {artist} - {title}");
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
        Command::CompletionEnhanced { shell } => match shell {
            cli::Shell::Bash => print!("{}", completion::enhanced_bash_completion()),
            cli::Shell::Fish => print!("{}", completion::enhanced_fish_completion()),
            _ => anyhow::bail!("Enhanced completions only supported for bash and fish"),
        },
        Command::CompleteTracks { shell } => {
            for name in completion::track_completions(&config.open_catalog()) {
                println!("{}", completion::format_completion(&name, shell));
            }
        }
    }

    Ok(())
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Read a setlist file: a track list, `{"setlist": [...]}` or `{"tracks": [...]}`.
fn read_setlist(path: &Path) -> Result<Vec<Track>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read setlist {}", path.display()))?;
    let document = serde_json::from_str(&text).with_context(|| format!("Setlist {} is not valid JSON", path.display()))?;
    Ok(db::parse_records(document))
}

fn write_setlist(path: &Path, set: &[Track]) -> Result<()> {
    let text = serde_json::to_string_pretty(set)?;
    fs::write(path, text + "\n").with_context(|| format!("Failed to write setlist {}", path.display()))
}

fn track_row(track: &Track) -> String {
    let bpm = track.tempo().map_or_else(|| "?".to_string(), |b| format!("{b:.0}"));
    let energy = track.energy_level().map_or_else(|| "?".to_string(), |e| e.to_string());
    format!("{:>4} {:>3}  e{:<2}  {track}", track.key, bpm, energy)
}

fn emit_setlist(set: &[Track], output: &OutputArgs) -> Result<()> {
    if let Some(path) = &output.out {
        write_setlist(path, set)?;
        info!("Wrote setlist to {}", path.display());
    }
    if output.json {
        println!("{}", serde_json::to_string_pretty(set)?);
        return Ok(());
    }

    let mut prev: Option<&Track> = None;
    for (i, track) in set.iter().enumerate() {
        let stage = track.stage.map_or("-", Phase::label);
        let transition = prev.map_or_else(String::new, |p| relation(&p.key, &track.key).to_string());
        let lock = if track.locked { "*" } else { " " };
        println!("{:>2}{lock} {stage:<9} {:<7} {}", i, transition, track_row(track));
        prev = Some(track);
    }
    Ok(())
}

fn print_report(set: &[Track], hours: u32, json: bool) -> Result<()> {
    let curve = analysis::energy_curve(set);
    let wheel = analysis::key_wheel(set);
    let report = analysis::transition_report(set, hours);

    if json {
        let value = serde_json::json!({
            "energy_curve": curve,
            "key_wheel": wheel,
            "transitions": report,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{} tracks", report.length);
    let bars: Vec<String> = curve
        .labels
        .iter()
        .zip(&curve.energy)
        .map(|(label, energy)| format!("{label:>4} {}", "#".repeat(usize::from(*energy))))
        .collect();
    println!("Energy curve:\n{}", bars.join("\n"));

    let keys: Vec<String> = wheel.key_counts.iter().map(|(k, n)| format!("{k}x{n}")).collect();
    println!("Keys: {}", keys.join(" "));

    let relations: Vec<String> = report.relations.iter().map(|(r, n)| format!("{r} {n}")).collect();
    println!("Transitions: {}", relations.join(", "));
    println!("Fifth jumps: {} of {} allowed", report.fifths, report.fifth_budget);
    if !report.triple_repeats.is_empty() {
        println!("Triple key repeats at slots {:?}", report.triple_repeats);
    }
    if report.duplicate_tracks > 0 {
        println!("{} duplicate tracks", report.duplicate_tracks);
    }
    println!("{}", if report.is_clean() { "Clean" } else { "Needs attention" });
    Ok(())
}
