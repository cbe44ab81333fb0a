//! Storage module for persisting run data
//!
//! This module handles the two durable documents of a harvest:
//! - the sync state (watermark and initial-run flag)
//! - the archive of threads and posts
//!
//! Both are JSON files replaced atomically. The archive is always written
//! before the state, so a crash in between re-fetches posts the archive
//! already holds and merge dedup absorbs them.

mod json;
mod traits;

pub use json::{read_json, write_json_atomic, JsonFileStore};
pub use traits::{PersistenceError, PersistenceResult, RunStore};

use crate::config::OutputConfig;

/// Opens the JSON store at the configured paths
pub fn open_store(output: &OutputConfig) -> JsonFileStore {
    JsonFileStore::new(&output.state_path, &output.archive_path)
}
