//! Output module for run summaries and archive exports
//!
//! This module handles:
//! - The report of a harvest run
//! - Exporting the threads of an archive whose titles match a filter

mod filter;
mod report;

pub use filter::{filter_by_regex, filter_by_title, load_threads, write_filtered, FilterError};
pub use report::{FailedThread, RunOutcome, RunReport};

/// Default destination of the title filter
pub const DEFAULT_FILTER_OUTPUT: &str = "filtered_threads.json";
