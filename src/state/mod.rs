//! State module for incremental harvesting
//!
//! # Components
//!
//! - `SyncState`: the persisted watermark and initial-run flag
//! - `SyncController`: per-run mode, in-scope decisions and the next watermark
//! - `TitleExclusion`: the thread title denylist applied before fetching

mod controller;
mod exclusion;
mod sync_state;

pub use controller::{SyncController, SyncMode};
pub use exclusion::TitleExclusion;
pub use sync_state::SyncState;
