//! Storage traits and error types
//!
//! This module defines the trait interface for run persistence and the
//! errors it reports.

use crate::archive::Archive;
use crate::state::SyncState;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or saving run data
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Malformed JSON in {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Trait for the backend that holds the sync state and the archive
///
/// Saves must be atomic: after a failed save the previous document is
/// still readable.
pub trait RunStore {
    /// Loads the sync state
    ///
    /// A missing document yields [`SyncState::initial`].
    fn load_state(&self) -> PersistenceResult<SyncState>;

    /// Replaces the sync state
    fn save_state(&self, state: &SyncState) -> PersistenceResult<()>;

    /// Loads the archive
    ///
    /// A missing document yields an empty archive for `source_forum`.
    fn load_archive(&self, source_forum: &str) -> PersistenceResult<Archive>;

    /// Replaces the archive
    fn save_archive(&self, archive: &Archive) -> PersistenceResult<()>;
}
