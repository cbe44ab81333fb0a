//! Run report
//!
//! Summarizes what one harvest run did, for logging and for tests.

use crate::state::SyncMode;
use chrono::{DateTime, Utc};
use std::fmt;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every discovered thread was visited
    Completed,

    /// Cancelled or past the run deadline before visiting every thread
    Interrupted,

    /// Ran to the end, but the index walk stopped early or a thread failed
    Incomplete,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// A thread whose walk failed, with enough context to replay it by hand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedThread {
    pub thread_id: String,
    pub url: String,
    pub error: String,
}

/// Counters and watermarks of one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: SyncMode,
    pub outcome: RunOutcome,

    /// Unique threads found on the index
    pub threads_discovered: usize,

    /// Threads excluded by title before fetching
    pub threads_skipped: usize,

    /// Threads left out by the `max_threads` limit
    pub threads_over_limit: usize,

    pub threads_failed: Vec<FailedThread>,

    /// Why the thread index walk stopped before its last page
    pub index_error: Option<String>,

    /// Threads that yielded at least one in-scope post
    pub threads_with_new_posts: usize,

    /// In-scope posts extracted this run
    pub new_posts: usize,

    /// Posts actually added to the archive after dedup
    pub posts_appended: usize,

    /// Post containers the extractor dropped
    pub posts_skipped: usize,

    pub previous_watermark: DateTime<Utc>,
    pub watermark: DateTime<Utc>,

    /// Whether the archive file was rewritten
    pub archive_written: bool,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Logs the report at info level, and each failed thread at warn
    pub fn log_summary(&self) {
        tracing::info!(
            mode = %self.mode,
            outcome = %self.outcome,
            threads_discovered = self.threads_discovered,
            threads_skipped = self.threads_skipped,
            threads_over_limit = self.threads_over_limit,
            threads_failed = self.threads_failed.len(),
            threads_with_new_posts = self.threads_with_new_posts,
            new_posts = self.new_posts,
            posts_appended = self.posts_appended,
            posts_skipped = self.posts_skipped,
            previous_watermark = %self.previous_watermark.to_rfc3339(),
            watermark = %self.watermark.to_rfc3339(),
            duration_secs = self.duration_secs(),
            "Harvest finished"
        );

        if let Some(error) = &self.index_error {
            tracing::warn!(error = %error, "Thread index not fully walked");
        }

        for failed in &self.threads_failed {
            tracing::warn!(
                thread_id = %failed.thread_id,
                url = %failed.url,
                error = %failed.error,
                "Thread not harvested"
            );
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Harvest Summary ===")?;
        writeln!(f, "Mode: {}", self.mode)?;
        writeln!(f, "Outcome: {}", self.outcome)?;
        writeln!(f, "Threads discovered: {}", self.threads_discovered)?;
        writeln!(f, "Threads skipped by title: {}", self.threads_skipped)?;
        if self.threads_over_limit > 0 {
            writeln!(f, "Threads over limit: {}", self.threads_over_limit)?;
        }
        if let Some(error) = &self.index_error {
            writeln!(f, "Index walk stopped early: {}", error)?;
        }
        writeln!(f, "Threads failed: {}", self.threads_failed.len())?;
        writeln!(f, "Threads with new posts: {}", self.threads_with_new_posts)?;
        writeln!(f, "New posts: {}", self.new_posts)?;
        writeln!(f, "Posts appended: {}", self.posts_appended)?;
        writeln!(
            f,
            "Watermark: {} -> {}",
            self.previous_watermark.to_rfc3339(),
            self.watermark.to_rfc3339()
        )?;
        write!(f, "Duration: {}s", self.duration_secs())
    }
}
