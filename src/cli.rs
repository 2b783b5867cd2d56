//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `mixset` binary.
//!
//! ## Commands
//!
//! - `generate`: Build a fresh set for a duration
//! - `regenerate`: Rebuild a set around its locked tracks
//! - `replace`: Swap one track of a set
//! - `search`: Page through the catalog
//! - `key` / `relation`: Camelot wheel lookups
//! - `report`: Energy curve, key wheel and transition audit of a set
//! - `simulate`: Batch-generate sets and aggregate their audits
//! - `import`: Load a JSON catalog into the configured store
//! - `preview`: Attach a streaming preview id to a catalog track
//!
//! ## Examples
//!
//! ```bash
//! mixset generate --hours 2 --start "Lamur" --out set.json
//! mixset replace set.json 5 --in-place
//! mixset relation "F# Minor" 12A
//! ```

use crate::config::BackendKind;
use clap::{ArgGroup, Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
///
/// Catalog selection is global so it can be given before or after the
/// subcommand.
#[derive(Parser, Debug)]
#[command(name = "mixset")]
#[command(about = "Mixset: harmonic-mixing DJ setlists from an annotated track catalog")]
#[command(version)]
pub struct Args {
    /// Catalog file (JSON or SQLite)
    ///
    /// Defaults to `tracks.json` in the platform data directory, or the
    /// `catalog_path` of the config file.
    #[arg(long, global = true, env = "MIXSET_CATALOG", value_hint = clap::ValueHint::FilePath)]
    pub catalog: Option<PathBuf>,

    /// Catalog storage format; guessed from the file extension when omitted
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that prints a setlist.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Also write the setlist as JSON to this file
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub out: Option<PathBuf>,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a fresh set
    ///
    /// Picks one of the hand-tuned phase templates for the duration and
    /// fills it track by track, following harmonic-mixing rules from the
    /// opening track onward.
    Generate {
        /// Set length in hours (1-5; longer sets use the 5 hour templates)
        #[arg(short = 'H', long, default_value_t = 1)]
        hours: u32,

        /// Open with the first track whose "artist - title" contains this
        #[arg(short, long, value_hint = clap::ValueHint::Other)]
        start: Option<String>,

        /// Seed for a reproducible set
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Rebuild a set around its locked tracks
    ///
    /// Tracks with `"isLocked": true` in the setlist file open the new set
    /// in their original order; the rest is generated after them.
    Regenerate {
        /// Setlist JSON file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        setlist: PathBuf,

        /// Set length in hours
        #[arg(short = 'H', long, default_value_t = 1)]
        hours: u32,

        /// Seed for a reproducible set
        #[arg(long)]
        seed: Option<u64>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Replace one track of a set
    ///
    /// The replacement mixes from the track before it and keeps the slot's
    /// phase. The first slot cannot be replaced.
    Replace {
        /// Setlist JSON file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        setlist: PathBuf,

        /// Zero-based slot index
        index: usize,

        /// Seed for a reproducible pick
        #[arg(long)]
        seed: Option<u64>,

        /// Write the updated setlist back to the input file
        #[arg(long, conflicts_with = "out")]
        in_place: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Search the catalog
    Search {
        /// Text matched against "artist title"; empty lists everything
        #[arg(default_value = "")]
        query: String,

        /// Only tracks that fit this phase (warmup, build, mid-peak, ...)
        #[arg(short, long)]
        phase: Option<String>,

        /// Page number, 100 tracks per page
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a key in Camelot notation with its compatible neighbours
    ///
    /// Accepts wheel notation ("8a") or a musical spelling ("A Minor").
    Key {
        /// Key to look up; omit to list the whole wheel
        key: Option<String>,
    },

    /// Classify the transition between two keys
    Relation {
        /// Key of the playing track
        from: String,
        /// Key of the next track
        to: String,
    },

    /// Analyse a setlist: energy curve, key usage and transitions
    Report {
        /// Setlist JSON file
        #[arg(value_hint = clap::ValueHint::FilePath)]
        setlist: PathBuf,

        /// Duration the fifth-jump budget is checked against
        #[arg(short = 'H', long, default_value_t = 1)]
        hours: u32,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Generate many sets and aggregate their transition audits
    ///
    /// Useful when tuning scoring constants in the config file.
    Simulate {
        /// Set length in hours
        #[arg(short = 'H', long, default_value_t = 1)]
        hours: u32,

        /// Number of sets to generate
        #[arg(short, long, default_value_t = 100)]
        runs: usize,

        /// Seed of the first run; run `i` uses `seed + i`
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Import a JSON catalog into the configured store
    ///
    /// Replaces the stored catalog. Keys are normalized to wheel notation
    /// and malformed records are skipped.
    Import {
        /// JSON file holding a track list or `{"tracks": [...]}`
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Attach a streaming preview id to a catalog track
    #[command(group(ArgGroup::new("service").required(true).args(["spotify", "youtube"])))]
    Preview {
        /// Track artist
        artist: String,
        /// Track title
        title: String,
        /// Spotify track id
        #[arg(long)]
        spotify: Option<String>,
        /// YouTube video id
        #[arg(long)]
        youtube: Option<String>,
    },

    /// Generate shell completions
    ///
    /// Usage: mixset completion bash > ~/.local/share/bash-completion/completions/mixset
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// Generate completion with track name completion for `--start`
    ///
    /// Usage: mixset completion-enhanced fish > ~/.config/fish/completions/mixset.fish
    CompletionEnhanced {
        /// Shell to generate enhanced completions for (bash and fish supported)
        shell: Shell,
    },

    /// List track names for completion (hidden command)
    #[command(hide = true)]
    CompleteTracks {
        /// Format for this shell
        #[arg(long)]
        shell: Option<Shell>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let args = Args::parse_from(["mixset", "generate", "-H", "3", "--start", "Lamur", "--json"]);
        match args.command {
            Command::Generate { hours, start, seed, output } => {
                assert_eq!(hours, 3);
                assert_eq!(start.as_deref(), Some("Lamur"));
                assert_eq!(seed, None);
                assert!(output.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_catalog_after_subcommand() {
        let args = Args::parse_from(["mixset", "search", "guy", "--catalog", "/tmp/t.db3", "--backend", "sqlite"]);
        assert_eq!(args.catalog, Some(PathBuf::from("/tmp/t.db3")));
        assert_eq!(args.backend, Some(BackendKind::Sqlite));
    }

    #[test]
    fn test_preview_requires_a_service() {
        assert!(Args::try_parse_from(["mixset", "preview", "a", "b"]).is_err());
        assert!(Args::try_parse_from(["mixset", "preview", "a", "b", "--youtube", "x"]).is_ok());
    }
}
