//! # Catalog Store
//!
//! The catalog is a flat list of annotated tracks kept behind a narrow
//! [`CatalogBackend`] interface. Two backends ship with the crate:
//!
//! - [`JsonFileBackend`]: a `tracks.json` document, either a bare list or an
//!   object with a `tracks` list. Writes go to a temporary file in the same
//!   directory which then replaces the original.
//! - [`SqliteBackend`]: one row per track, each record stored as JSON so
//!   unknown fields survive a round-trip.
//!
//! [`Catalog`] caches the loaded tracks in memory as a shared snapshot.
//! Readers clone the `Arc`; a save writes through the backend first and only
//! then swaps the snapshot, so no reader ever observes a half-written list.

use crate::filter;
use crate::key::normalize_key;
use crate::phase::Phase;
use crate::track::{identity_of, Preview, Track};
use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Tracks returned per search page.
pub const SEARCH_PAGE_SIZE: usize = 100;

/// Durable storage for the catalog.
pub trait CatalogBackend: Send + Sync {
    /// Read every well-formed record. Malformed records are skipped.
    fn read(&self) -> Result<Vec<Track>>;

    /// Replace the stored catalog with `tracks`.
    fn write(&self, tracks: &[Track]) -> Result<()>;

    /// Human-readable location, for logs and `--verbose` output.
    fn describe(&self) -> String;
}

/// Decode a catalog document, keeping every record that parses.
///
/// Accepts a bare list or an object holding a `tracks` (catalog) or
/// `setlist` list. Keys are normalized to wheel notation.
#[must_use]
pub fn parse_records(document: serde_json::Value) -> Vec<Track> {
    let records = match document {
        serde_json::Value::Array(records) => records,
        serde_json::Value::Object(mut map) => match map.remove("tracks").or_else(|| map.remove("setlist")) {
            Some(serde_json::Value::Array(records)) => records,
            _ => {
                warn!("Document has no 'tracks' or 'setlist' list");
                Vec::new()
            }
        },
        _ => {
            warn!("Catalog document is neither a list nor an object");
            Vec::new()
        }
    };

    let total = records.len();
    let tracks: Vec<Track> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match serde_json::from_value::<Track>(record) {
            Ok(mut track) => {
                track.key = normalize_key(&track.key);
                Some(track)
            }
            Err(err) => {
                warn!("Skipping malformed catalog record #{i}: {err}");
                None
            }
        })
        .collect();

    if tracks.len() < total {
        info!("Loaded {} of {total} catalog records", tracks.len());
    }
    tracks
}

/// Catalog stored as a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogBackend for JsonFileBackend {
    fn read(&self) -> Result<Vec<Track>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read catalog {}", self.path.display()))?;
        let document: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("Catalog {} is not valid JSON", self.path.display()))?;
        Ok(parse_records(document))
    }

    fn write(&self, tracks: &[Track]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create catalog directory {}", dir.display()))?;

        let records: Vec<Track> = tracks.iter().map(Track::unstaged).collect();
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, &records).context("Failed to serialize catalog")?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all().context("Failed to flush catalog")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace catalog {}", self.path.display()))?;

        debug!("Wrote {} tracks to {}", records.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Catalog stored in an `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: PathBuf,
}

impl SqliteBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the database, creating the `track` table when missing.
    fn connect(&self) -> Result<Connection> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create catalog directory {}", dir.display()))?;
        }
        let conn = Connection::open(&self.path).with_context(|| {
            format!("SQLite connection refused. DB location: {}", self.path.display())
        })?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS track (
                id     INTEGER PRIMARY KEY,
                artist TEXT NOT NULL,
                title  TEXT NOT NULL,
                record TEXT NOT NULL
            )",
            (),
        )
        .context("Invalid SQL command when CREATEing track TABLE")?;
        Ok(conn)
    }
}

impl CatalogBackend for SqliteBackend {
    fn read(&self) -> Result<Vec<Track>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT record FROM track ORDER BY id")
            .context("Invalid SQL statement when SELECTing tracks")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Cannot query tracks")?;

        let mut records = Vec::new();
        for row in rows {
            let text = row.context("Queried track row failed")?;
            match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(value) => records.push(value),
                Err(err) => warn!("Skipping unreadable track row: {err}"),
            }
        }
        Ok(parse_records(serde_json::Value::Array(records)))
    }

    fn write(&self, tracks: &[Track]) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        {
            tx.execute("DELETE FROM track", ())
                .context("Failed to clear track TABLE")?;
            let mut stmt = tx.prepare("INSERT INTO track (artist, title, record) VALUES (?1, ?2, ?3)")?;
            for track in tracks {
                let record = serde_json::to_string(&track.unstaged())
                    .with_context(|| format!("Failed to serialize {track}"))?;
                stmt.execute((&track.artist, &track.title, &record))
                    .with_context(|| format!("Invalid SQL statement when INSERTing {track}"))?;
            }
        }
        tx.commit().context("Committing SQL transaction failed")?;
        debug!("Wrote {} tracks to {}", tracks.len(), self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub tracks: Vec<Track>,
    pub page: usize,
    pub total: usize,
    pub has_more: bool,
}

/// In-memory view of a [`CatalogBackend`].
pub struct Catalog {
    backend: Box<dyn CatalogBackend>,
    cache: RwLock<Option<Arc<Vec<Track>>>>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("backend", &self.backend.describe())
            .finish_non_exhaustive()
    }
}

impl Catalog {
    pub fn new(backend: Box<dyn CatalogBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Current snapshot, reading the backend on first use.
    ///
    /// Never fails: an absent or unreadable store yields an empty catalog,
    /// which is cached like any other result until the next save.
    pub fn load(&self) -> Arc<Vec<Track>> {
        if let Some(tracks) = self.cache.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            return Arc::clone(tracks);
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(tracks) = cache.as_ref() {
            return Arc::clone(tracks);
        }
        let tracks = match self.backend.read() {
            Ok(tracks) => {
                info!("Loaded {} tracks from {}", tracks.len(), self.backend.describe());
                tracks
            }
            Err(err) => {
                warn!("Catalog unavailable, continuing empty: {err:#}");
                Vec::new()
            }
        };
        let tracks = Arc::new(tracks);
        *cache = Some(Arc::clone(&tracks));
        tracks
    }

    /// Persist `tracks` and make them the cached snapshot.
    ///
    /// # Errors
    ///
    /// Fails when the backend cannot write; the previous snapshot stays
    /// visible in that case.
    pub fn save(&self, tracks: Vec<Track>) -> Result<()> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.store(tracks)
    }

    fn store(&self, tracks: Vec<Track>) -> Result<()> {
        self.backend
            .write(&tracks)
            .with_context(|| format!("Failed to save catalog to {}", self.backend.describe()))?;
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(tracks));
        Ok(())
    }

    /// Look a track up by artist and title, ignoring case.
    #[must_use]
    pub fn find(&self, artist: &str, title: &str) -> Option<Track> {
        let identity = identity_of(artist, title);
        self.load().iter().find(|t| t.identity() == identity).cloned()
    }

    /// Substring search over "artist title", optionally limited to tracks
    /// eligible for `phase`. Pages are numbered from 1.
    #[must_use]
    pub fn search(&self, query: &str, phase: Option<Phase>, page: usize) -> SearchPage {
        let needle = query.trim().to_lowercase();
        let tracks = self.load();
        let matches: Vec<&Track> = tracks
            .iter()
            .filter(|t| {
                needle.is_empty() || format!("{} {}", t.artist, t.title).to_lowercase().contains(&needle)
            })
            .filter(|t| phase.map_or(true, |p| filter::is_eligible(t, p, 1)))
            .collect();

        let page = page.max(1);
        let start = (page - 1).saturating_mul(SEARCH_PAGE_SIZE);
        let end = start.saturating_add(SEARCH_PAGE_SIZE);
        trace!("Search '{needle}' matched {} tracks", matches.len());

        SearchPage {
            tracks: matches.iter().skip(start).take(SEARCH_PAGE_SIZE).map(|t| (*t).clone()).collect(),
            page,
            total: matches.len(),
            has_more: end < matches.len(),
        }
    }

    /// Attach a preview identifier to a catalog track and persist it.
    ///
    /// Returns `false` when no track matches.
    ///
    /// # Errors
    ///
    /// Fails when the backend cannot write.
    pub fn record_preview(&self, artist: &str, title: &str, preview: Preview) -> Result<bool> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let identity = identity_of(artist, title);
        let mut tracks = self.load().as_ref().clone();

        let Some(track) = tracks.iter_mut().find(|t| t.identity() == identity) else {
            debug!("No catalog track '{identity}' to attach a preview to");
            return Ok(false);
        };
        match preview {
            Preview::Spotify(id) => track.spotify_id = Some(id),
            Preview::Youtube(id) => track.youtube_id = Some(id),
        }
        info!("Recorded preview for {track}");
        self.store(tracks)?;
        Ok(true)
    }

    /// Replace the catalog with the records of a JSON document at `path`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed, or the backend cannot
    /// write.
    pub fn import(&self, path: &Path) -> Result<usize> {
        let tracks = JsonFileBackend::new(path).read()?;
        let count = tracks.len();
        self.save(tracks)?;
        info!("Imported {count} tracks from {} into {}", path.display(), self.describe());
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn json_catalog(dir: &TempDir, body: &str) -> Catalog {
        let path = dir.path().join("tracks.json");
        fs::write(&path, body).unwrap();
        Catalog::new(Box::new(JsonFileBackend::new(path)))
    }

    #[test]
    fn test_parse_list_and_object_documents() {
        let list = serde_json::json!([{"artist": "a", "track": "b", "key": "A Minor"}]);
        let object = serde_json::json!({"tracks": [{"artist": "a", "track": "b", "key": "8a"}]});
        assert_eq!(parse_records(list)[0].key, "8A");
        assert_eq!(parse_records(object)[0].key, "8A");
        assert!(parse_records(serde_json::json!("nope")).is_empty());
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let doc = serde_json::json!([
            {"artist": "a", "track": "ok", "key": "8A"},
            {"artist": 4, "track": ["bad"]},
            "not a record"
        ]);
        let tracks = parse_records(doc);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "ok");
    }

    #[test]
    fn test_load_soft_fails() {
        let dir = TempDir::new().unwrap();
        let missing = Catalog::new(Box::new(JsonFileBackend::new(dir.path().join("none.json"))));
        assert!(missing.load().is_empty());

        let broken = json_catalog(&dir, "{ not json");
        assert!(broken.load().is_empty());
    }

    #[test]
    fn test_load_is_cached_until_save() {
        let dir = TempDir::new().unwrap();
        let catalog = json_catalog(&dir, r#"[{"artist": "a", "track": "b", "key": "8A"}]"#);
        assert_eq!(catalog.load().len(), 1);

        fs::write(dir.path().join("tracks.json"), "[]").unwrap();
        assert_eq!(catalog.load().len(), 1);

        catalog.save(Vec::new()).unwrap();
        assert!(catalog.load().is_empty());
    }

    #[test]
    fn test_save_strips_setlist_tags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tracks.json");
        let catalog = Catalog::new(Box::new(JsonFileBackend::new(&path)));
        let mut track = Track::new("a", "b", 120.0, "8A", 4).staged(Phase::Build);
        track.locked = true;
        catalog.save(vec![track]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stage"));
        assert!(!text.contains("isLocked"));
    }

    #[test]
    fn test_record_preview_persists() {
        let dir = TempDir::new().unwrap();
        let catalog = json_catalog(&dir, r#"[{"artist": "Guy J", "track": "Lamur", "key": "8A"}]"#);
        assert!(catalog
            .record_preview("guy j", "LAMUR", Preview::Spotify("abc".into()))
            .unwrap());
        assert!(!catalog.record_preview("x", "y", Preview::Youtube("z".into())).unwrap());

        let reread = JsonFileBackend::new(dir.path().join("tracks.json")).read().unwrap();
        assert_eq!(reread[0].spotify_id.as_deref(), Some("abc"));
        assert_eq!(catalog.find("Guy J", "Lamur").unwrap().spotify_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_search_pages() {
        let catalog = Catalog::new(Box::new(JsonFileBackend::new("/nonexistent/tracks.json")));
        let tracks: Vec<Track> = (0..250)
            .map(|i| Track::new("Artist", &format!("Song {i}"), 118.0, "8A", 3))
            .collect();
        *catalog.cache.write().unwrap() = Some(Arc::new(tracks));

        let first = catalog.search("artist song", None, 1);
        assert_eq!(first.tracks.len(), SEARCH_PAGE_SIZE);
        assert!(first.has_more);
        let last = catalog.search("ARTIST", None, 3);
        assert_eq!(last.tracks.len(), 50);
        assert!(!last.has_more);
        assert_eq!(catalog.search("song 7", Some(Phase::Driving), 1).total, 0);
        assert_eq!(catalog.search("", Some(Phase::Warmup), 0).page, 1);
    }

    #[test]
    fn test_sqlite_round_trip() {
        let dir = TempDir::new().unwrap();
        let backend = SqliteBackend::new(dir.path().join("catalog.db3"));
        assert!(backend.read().unwrap().is_empty());

        let mut track = Track::new("a", "b", 124.0, "Db Major", 8);
        track.extra.insert("label".into(), serde_json::json!("Anjunadeep"));
        backend.write(&[track]).unwrap();
        backend.write(&[Track::new("c", "d", 120.0, "1A", 4), Track::new("e", "f", 120.0, "2A", 4)]).unwrap();

        let tracks = backend.read().unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].title, "d");
    }
}
