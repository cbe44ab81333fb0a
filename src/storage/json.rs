//! JSON file storage implementation
//!
//! Each document lives in its own file. Writes go to a temporary file in
//! the destination directory which is then renamed over the target.

use crate::archive::Archive;
use crate::state::SyncState;
use crate::storage::traits::{PersistenceError, PersistenceResult, RunStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Stores the sync state and the archive as two JSON files
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    state_path: PathBuf,
    archive_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(state_path: impl Into<PathBuf>, archive_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
            archive_path: archive_path.into(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }
}

impl RunStore for JsonFileStore {
    fn load_state(&self) -> PersistenceResult<SyncState> {
        match read_json::<SyncState>(&self.state_path) {
            Ok(Some(state)) => Ok(state),
            Ok(None) => {
                debug!(path = %self.state_path.display(), "No state file, starting initial run");
                Ok(SyncState::initial())
            }
            // A damaged state file only costs a full re-crawl; merge dedup
            // keeps the archive intact.
            Err(PersistenceError::Deserialize { path, source }) => {
                warn!(
                    path = %path.display(),
                    error = %source,
                    "State file unreadable, falling back to initial run"
                );
                Ok(SyncState::initial())
            }
            Err(e) => Err(e),
        }
    }

    fn save_state(&self, state: &SyncState) -> PersistenceResult<()> {
        write_json_atomic(&self.state_path, state)
    }

    fn load_archive(&self, source_forum: &str) -> PersistenceResult<Archive> {
        match read_json::<Archive>(&self.archive_path)? {
            Some(archive) => Ok(archive),
            None => {
                debug!(path = %self.archive_path.display(), "No archive file, starting empty");
                Ok(Archive::empty(source_forum))
            }
        }
    }

    fn save_archive(&self, archive: &Archive) -> PersistenceResult<()> {
        write_json_atomic(&self.archive_path, archive)
    }
}

/// Reads a JSON document, returning `None` if the file does not exist
pub fn read_json<T: DeserializeOwned>(path: &Path) -> PersistenceResult<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| PersistenceError::Deserialize {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes `value` as pretty JSON, replacing `path` atomically
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> PersistenceResult<()> {
    let json = serde_json::to_string_pretty(value)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(io_err)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(json.as_bytes()).map_err(io_err)?;
    tmp.write_all(b"\n").map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;

    tmp.persist(path).map_err(|e| PersistenceError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    debug!(path = %path.display(), bytes = json.len(), "Wrote JSON document");
    Ok(())
}
