//! # Shell Completion Module
//!
//! Completion scripts for the `mixset` binary, plus dynamic completion of
//! track names for `generate --start`.
//!
//! ## Usage
//!
//! ```bash
//! # Generate bash completions
//! mixset completion bash > ~/.local/share/bash-completion/completions/mixset
//!
//! # Track-aware fish completions
//! mixset completion-enhanced fish > ~/.config/fish/completions/mixset.fish
//! ```

use crate::cli::Shell;
use crate::db::Catalog;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::collections::BTreeSet;
use std::io;

/// Subcommands with their one-line descriptions, in help order.
const SUBCOMMANDS: [(&str, &str); 13] = [
    ("generate", "Generate a fresh set"),
    ("regenerate", "Rebuild a set around its locked tracks"),
    ("replace", "Replace one track of a set"),
    ("search", "Search the catalog"),
    ("key", "Show a key in Camelot notation"),
    ("relation", "Classify the transition between two keys"),
    ("report", "Analyse a setlist"),
    ("simulate", "Generate many sets and aggregate their audits"),
    ("import", "Import a JSON catalog into the configured store"),
    ("preview", "Attach a streaming preview id to a catalog track"),
    ("completion", "Generate shell completions"),
    ("completion-enhanced", "Generate track-aware shell completions"),
    ("help", "Print help for commands"),
];

const PHASES: &str = "warmup build mid-peak peak-time driving closing";

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Fish completion script with track name completion for `--start`
#[must_use]
pub fn enhanced_fish_completion() -> String {
    let mut script = String::from(
        r"# Mixset completion script for Fish shell with track name completion
# Install with: mixset completion-enhanced fish > ~/.config/fish/completions/mixset.fish

function __mixset_complete_tracks
    if command -sq mixset
        mixset complete-tracks --shell fish 2>/dev/null
    end
end

complete -c mixset -e
complete -c mixset -s h -l help -d 'Print help information'
complete -c mixset -s V -l version -d 'Print version information'
complete -c mixset -l catalog -r -F -d 'Catalog file (JSON or SQLite)'
complete -c mixset -l backend -x -a 'json sqlite' -d 'Catalog storage format'

",
    );
    for (name, about) in SUBCOMMANDS {
        script.push_str(&format!(
            "complete -c mixset -f -n '__fish_use_subcommand' -a '{name}' -d '{about}'\n"
        ));
    }
    script.push_str(&format!(
        r"
complete -c mixset -f -n '__fish_seen_subcommand_from generate' -s s -l start -x -a '(__mixset_complete_tracks)' -d 'Opening track'
complete -c mixset -f -n '__fish_seen_subcommand_from generate regenerate report simulate' -s H -l hours -x -a '1 2 3 4 5' -d 'Set length in hours'
complete -c mixset -f -n '__fish_seen_subcommand_from search' -s p -l phase -x -a '{PHASES}' -d 'Only tracks fitting this phase'
complete -c mixset -f -n '__fish_seen_subcommand_from completion completion-enhanced' -a 'bash zsh fish power-shell elvish'
"
    ));
    script
}

/// Bash completion script with track name completion for `--start`
#[must_use]
pub fn enhanced_bash_completion() -> String {
    let subcommands: Vec<&str> = SUBCOMMANDS.iter().map(|(name, _)| *name).collect();
    format!(
        r#"#!/bin/bash
# Mixset completion script with track name completion
# Install with: mixset completion-enhanced bash > ~/.local/share/bash-completion/completions/mixset

_mixset() {{
    local cur prev words cword
    _init_completion || return

    case "${{prev}}" in
        --start|-s)
            local IFS=$'\n'
            COMPREPLY=($(mixset complete-tracks --shell bash 2>/dev/null | grep -i "^${{cur}}"))
            return 0
            ;;
        --hours|-H)
            COMPREPLY=($(compgen -W "1 2 3 4 5" -- "${{cur}}"))
            return 0
            ;;
        --phase|-p)
            COMPREPLY=($(compgen -W "{PHASES}" -- "${{cur}}"))
            return 0
            ;;
        --backend)
            COMPREPLY=($(compgen -W "json sqlite" -- "${{cur}}"))
            return 0
            ;;
        --catalog|--out|-o|regenerate|replace|report|import)
            _filedir
            return 0
            ;;
        completion|completion-enhanced)
            COMPREPLY=($(compgen -W "bash zsh fish power-shell elvish" -- "${{cur}}"))
            return 0
            ;;
    esac

    if [[ $cword -eq 1 ]]; then
        COMPREPLY=($(compgen -W "{} --catalog --backend --help --version" -- "${{cur}}"))
    else
        case "${{words[1]}}" in
            generate)
                COMPREPLY=($(compgen -W "--hours --start --seed --json --out --help" -- "${{cur}}"))
                ;;
            regenerate)
                COMPREPLY=($(compgen -W "--hours --seed --json --out --help" -- "${{cur}}"))
                ;;
            replace)
                COMPREPLY=($(compgen -W "--seed --in-place --json --out --help" -- "${{cur}}"))
                ;;
            search)
                COMPREPLY=($(compgen -W "--phase --page --json --help" -- "${{cur}}"))
                ;;
            simulate)
                COMPREPLY=($(compgen -W "--hours --runs --seed --json --help" -- "${{cur}}"))
                ;;
            preview)
                COMPREPLY=($(compgen -W "--spotify --youtube --help" -- "${{cur}}"))
                ;;
            *)
                COMPREPLY=($(compgen -W "--help" -- "${{cur}}"))
                ;;
        esac
    fi
}} &&
complete -F _mixset mixset

# ex: filetype=sh
"#,
        subcommands.join(" ")
    )
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Sorted, de-duplicated titles and "artist - title" pairs from the catalog.
/// An unreadable catalog yields nothing.
#[must_use]
pub fn track_completions(catalog: &Catalog) -> Vec<String> {
    let mut completions = BTreeSet::new();
    for track in catalog.load().iter() {
        if !track.title.is_empty() {
            completions.insert(track.title.clone());
        }
        if !track.artist.is_empty() && !track.title.is_empty() {
            completions.insert(track.to_string());
        }
    }
    completions.into_iter().collect()
}

/// Quote a completion for `shell`. Fish handles escaping itself.
#[must_use]
pub fn format_completion(completion: &str, shell: Option<Shell>) -> String {
    match shell {
        Some(Shell::Fish) => completion.to_string(),
        _ if completion.contains([' ', '\t', '\n']) => {
            format!("\"{}\"", completion.replace('"', "\\\""))
        }
        _ => completion.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::JsonFileBackend;
    use tempfile::TempDir;

    #[test]
    fn test_shell_conversion() {
        assert_eq!(shell_to_completion_shell(Shell::Bash), CompletionShell::Bash);
        assert_eq!(shell_to_completion_shell(Shell::PowerShell), CompletionShell::PowerShell);
    }

    #[test]
    fn test_track_completions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracks.json");
        std::fs::write(
            &path,
            r#"[{"artist": "Guy J", "track": "Lamur"}, {"artist": "Guy J", "track": "Lamur"}, {"artist": "", "track": "Untitled"}]"#,
        )
        .unwrap();
        let catalog = Catalog::new(Box::new(JsonFileBackend::new(path)));
        assert_eq!(track_completions(&catalog), ["Guy J - Lamur", "Lamur", "Untitled"]);

        let empty = Catalog::new(Box::new(JsonFileBackend::new(dir.path().join("missing.json"))));
        assert!(track_completions(&empty).is_empty());
    }

    #[test]
    fn test_format_completion() {
        assert_eq!(format_completion("Lamur", None), "Lamur");
        assert_eq!(format_completion("Guy J - Lamur", Some(Shell::Bash)), "\"Guy J - Lamur\"");
        assert_eq!(format_completion("Guy J - Lamur", Some(Shell::Fish)), "Guy J - Lamur");
    }

    #[test]
    fn test_enhanced_scripts_list_every_subcommand() {
        let bash = enhanced_bash_completion();
        let fish = enhanced_fish_completion();
        for (name, _) in SUBCOMMANDS {
            assert!(bash.contains(name), "{name}");
            assert!(fish.contains(&format!("-a '{name}'")), "{name}");
        }
        assert!(bash.contains("complete-tracks"));
    }
}
