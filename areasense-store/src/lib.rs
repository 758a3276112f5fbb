//! JSON file persistence for AreaSense room profiles
//!
//! [`JsonFileStore`] implements [`ProfileStore`] over a single JSON document.
//! Saves write a sibling temporary file, flush it to disk and rename it over
//! the target, so a crash mid-save leaves either the old or the new document,
//! never a truncated one.
//!
//! ```no_run
//! use areasense_core::{Tracker, TrackerConfig};
//! use areasense_store::JsonFileStore;
//!
//! let mut store = JsonFileStore::new("/var/lib/areasense/profiles.json");
//! let mut tracker = Tracker::new(TrackerConfig::default());
//! tracker.load_profiles(&mut store)?;
//! // ... ticks ...
//! tracker.save_profiles(&mut store)?;
//! # Ok::<(), areasense_store::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use areasense_core::{AreaProfileMap, ProfileStore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Document format written by this crate
pub const FORMAT_VERSION: u32 = 1;

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The document is not valid profile JSON
    #[error("malformed profile document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document was written by an incompatible version
    #[error("unsupported format version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Version this crate writes
        expected: u32,
    },
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    profiles: &'a AreaProfileMap,
}

#[derive(Deserialize)]
struct Document {
    version: u32,
    #[serde(default)]
    profiles: AreaProfileMap,
}

/// Profile store backed by one JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    pretty: bool,
}

impl JsonFileStore {
    /// Store at `path`; the file need not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: false,
        }
    }

    /// Indent the written JSON
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Target file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "profiles".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl ProfileStore for JsonFileStore {
    type Error = StoreError;

    /// Read all profiles; a missing file is an empty map
    fn load(&mut self) -> Result<AreaProfileMap, StoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} not found, starting with no profiles", self.path.display());
                return Ok(AreaProfileMap::new());
            }
            Err(e) => return Err(self.io_error(&self.path, e)),
        };

        let document: Document = serde_json::from_reader(BufReader::new(file))?;
        if document.version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: document.version,
                expected: FORMAT_VERSION,
            });
        }
        log::info!("loaded {} profile(s) from {}", document.profiles.len(), self.path.display());
        Ok(document.profiles)
    }

    fn save(&mut self, profiles: &AreaProfileMap) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(dir, e))?;
        }

        let temp = self.temp_path();
        let file = File::create(&temp).map_err(|e| self.io_error(&temp, e))?;
        let mut writer = BufWriter::new(file);
        let document = DocumentRef {
            version: FORMAT_VERSION,
            profiles,
        };
        if self.pretty {
            serde_json::to_writer_pretty(&mut writer, &document)?;
        } else {
            serde_json::to_writer(&mut writer, &document)?;
        }
        writer.flush().map_err(|e| self.io_error(&temp, e))?;
        let file = writer.into_inner().map_err(|e| self.io_error(&temp, e.into_error()))?;
        file.sync_all().map_err(|e| self.io_error(&temp, e))?;
        drop(file);

        fs::rename(&temp, &self.path).map_err(|e| self.io_error(&self.path, e))?;
        log::debug!("saved {} profile(s) to {}", profiles.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use areasense_core::{AreaProfile, ConfidenceScore, ScannerId};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sample_profiles() -> AreaProfileMap {
        let mut readings = BTreeMap::new();
        readings.insert(ScannerId::from("k1"), -55.0);
        readings.insert(ScannerId::from("l1"), -78.0);

        let mut kitchen = AreaProfile::new("kitchen".into());
        kitchen.update_trained(&readings);
        kitchen.update_auto(&readings, ConfidenceScore::from_float(0.8), 5_000);

        let mut profiles = AreaProfileMap::new();
        profiles.insert("kitchen".into(), kitchen);
        profiles
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("profiles.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn saved_profiles_load_back() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("nested/profiles.json")).pretty(true);
        let profiles = sample_profiles();

        store.save(&profiles).unwrap();
        assert!(!store.temp_path().exists());
        assert_eq!(store.load().unwrap(), profiles);
    }

    #[test]
    fn save_replaces_previous_document() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("profiles.json"));
        store.save(&sample_profiles()).unwrap();
        store.save(&AreaProfileMap::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, b"{\"version\": 1, \"profiles\": [").unwrap();
        let mut store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Json(_))));
    }

    #[test]
    fn newer_format_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles.json");
        fs::write(&path, b"{\"version\": 7, \"profiles\": {}}").unwrap();
        let mut store = JsonFileStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(StoreError::UnsupportedVersion { found: 7, expected: 1 })
        ));
    }
}
