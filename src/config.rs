//! # Configuration Module
//!
//! Locates the catalog and loads optional tuning overrides.
//!
//! ## Data Storage
//!
//! The default catalog lives in the platform-standard data directory:
//! - Linux: `~/.local/share/mixset/tracks.json`
//! - macOS: `~/Library/Application Support/mixset/tracks.json`
//! - Windows: `%APPDATA%\mixset\tracks.json`
//!
//! ## Config File
//!
//! `config.json` in the platform config directory (`~/.config/mixset/` on
//! Linux) may override the catalog location, the storage backend, and any
//! scoring constant:
//!
//! ```json
//! {
//!   "catalog_path": "/srv/dj/tracks.db3",
//!   "backend": "sqlite",
//!   "scoring": { "recent_key_penalty": 350.0, "top_fraction": 0.2 }
//! }
//! ```
//!
//! Every field is optional. A missing file means defaults; an unreadable one
//! is logged and ignored.

use crate::algorithm::ScoringConfig;
use crate::db::{Catalog, CatalogBackend, JsonFileBackend, SqliteBackend};
use anyhow::{Context, Result};
use log::{debug, warn};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "mixset";
const CATALOG_FILE: &str = "tracks.json";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-appropriate data directory for mixset, creating it
/// when missing.
///
/// # Errors
///
/// Fails when the system data directory cannot be determined or the
/// `mixset` subdirectory cannot be created.
///
/// ```no_run
/// let dir = mixset::config::get_data_dir()?;
/// println!("Catalog lives in {}", dir.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create mixset data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Default catalog path inside the data directory.
///
/// # Errors
///
/// See [`get_data_dir`].
pub fn get_catalog_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(CATALOG_FILE))
}

/// Location of the optional config file, if the platform has a config dir.
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Storage format of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Json,
    Sqlite,
}

impl BackendKind {
    /// Guess from the file extension: `.db`, `.db3`, `.sqlite` and
    /// `.sqlite3` are SQLite, anything else JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("db" | "db3" | "sqlite" | "sqlite3") => BackendKind::Sqlite,
            _ => BackendKind::Json,
        }
    }
}

/// Config file contents; every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub catalog_path: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub scoring: ScoringConfig,
}

impl FileConfig {
    /// Read a config file. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the catalog file
    pub catalog_path: PathBuf,
    pub backend: BackendKind,
    pub scoring: ScoringConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let catalog_path = get_catalog_path().unwrap_or_else(|_| PathBuf::from(CATALOG_FILE));
        Self {
            backend: BackendKind::from_path(&catalog_path),
            catalog_path,
            scoring: ScoringConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Resolve the configuration from the config file plus command-line
    /// overrides. A broken config file is reported and skipped.
    #[must_use]
    pub fn load(catalog: Option<&Path>, backend: Option<BackendKind>) -> Self {
        let file = match config_file_path() {
            Some(path) => FileConfig::read(&path).unwrap_or_else(|err| {
                warn!("Ignoring config file: {err:#}");
                FileConfig::default()
            }),
            None => FileConfig::default(),
        };
        Self::resolve(file, catalog, backend)
    }

    /// Merge a parsed config file with overrides; overrides win.
    #[must_use]
    pub fn resolve(file: FileConfig, catalog: Option<&Path>, backend: Option<BackendKind>) -> Self {
        let defaults = Self::default();
        let catalog_path = catalog
            .map(Path::to_path_buf)
            .or(file.catalog_path)
            .map_or(defaults.catalog_path, |path| absolutize(&path));
        let backend = backend
            .or(file.backend)
            .unwrap_or_else(|| BackendKind::from_path(&catalog_path));

        debug!("Catalog: {} ({backend:?})", catalog_path.display());
        Self {
            catalog_path,
            backend,
            scoring: file.scoring,
        }
    }

    /// Create configuration with an explicit catalog path
    #[must_use]
    pub fn with_catalog_path(catalog_path: PathBuf) -> Self {
        Self {
            backend: BackendKind::from_path(&catalog_path),
            catalog_path,
            scoring: ScoringConfig::default(),
        }
    }

    /// Open the configured catalog.
    #[must_use]
    pub fn open_catalog(&self) -> Catalog {
        let backend: Box<dyn CatalogBackend> = match self.backend {
            BackendKind::Json => Box::new(JsonFileBackend::new(&self.catalog_path)),
            BackendKind::Sqlite => Box::new(SqliteBackend::new(&self.catalog_path)),
        };
        Catalog::new(backend)
    }
}

/// Absolute form of `path`, leaving it untouched if that fails.
#[must_use]
pub fn absolutize(path: &Path) -> PathBuf {
    path.absolutize().map_or_else(|_| path.to_path_buf(), |p| p.into_owned())
}
