//! Incremental sync decisions
//!
//! The controller is created from the persisted [`SyncState`] at run start,
//! decides per post whether it is new, and produces the state to persist
//! when the run ends.

use crate::archive::PostRecord;
use crate::state::SyncState;
use chrono::{DateTime, Utc};
use std::fmt;

/// Crawl mode for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every extracted post is in scope
    Initial,

    /// Only posts strictly newer than the watermark are in scope
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Incremental => write!(f, "incremental"),
        }
    }
}

/// Owns the watermark logic for a single run
#[derive(Debug, Clone)]
pub struct SyncController {
    start_state: SyncState,
    mode: SyncMode,
    newest_seen: Option<DateTime<Utc>>,
    in_scope: usize,
    out_of_scope: usize,
}

impl SyncController {
    /// Starts a run from the persisted state
    ///
    /// `force_full` runs in initial mode regardless of the saved flag. The
    /// saved watermark is kept as the floor for the new one either way.
    pub fn start(state: SyncState, force_full: bool) -> Self {
        let mode = if force_full || state.is_initial_run {
            SyncMode::Initial
        } else {
            SyncMode::Incremental
        };

        Self {
            start_state: state,
            mode,
            newest_seen: None,
            in_scope: 0,
            out_of_scope: 0,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Watermark read at run start
    pub fn watermark(&self) -> DateTime<Utc> {
        self.start_state.last_scrape_timestamp
    }

    /// Whether a post belongs to this run's output
    pub fn is_in_scope(&self, post: &PostRecord) -> bool {
        match self.mode {
            SyncMode::Initial => true,
            SyncMode::Incremental => post.timestamp > self.watermark(),
        }
    }

    /// Keeps the in-scope posts, in order, and records their timestamps
    pub fn filter_posts(&mut self, posts: Vec<PostRecord>) -> Vec<PostRecord> {
        let total = posts.len();
        let kept: Vec<PostRecord> = posts.into_iter().filter(|p| self.is_in_scope(p)).collect();

        for post in &kept {
            self.observe(post.timestamp);
        }
        self.in_scope += kept.len();
        self.out_of_scope += total - kept.len();

        kept
    }

    fn observe(&mut self, timestamp: DateTime<Utc>) {
        self.newest_seen = Some(match self.newest_seen {
            Some(current) if current >= timestamp => current,
            _ => timestamp,
        });
    }

    /// Number of posts accepted so far
    pub fn in_scope_count(&self) -> usize {
        self.in_scope
    }

    /// Number of posts rejected as already processed
    pub fn out_of_scope_count(&self) -> usize {
        self.out_of_scope
    }

    /// max(start watermark, newest in-scope timestamp)
    pub fn new_watermark(&self) -> DateTime<Utc> {
        match self.newest_seen {
            Some(newest) if newest > self.watermark() => newest,
            _ => self.watermark(),
        }
    }

    /// State to persist after a completed run
    ///
    /// A completed run always leaves initial mode, even with no posts.
    pub fn finish(&self) -> SyncState {
        SyncState {
            last_scrape_timestamp: self.new_watermark(),
            is_initial_run: false,
        }
    }

    /// State to persist after an interrupted run: unchanged from the start
    pub fn abandon(&self) -> SyncState {
        self.start_state
    }

    /// State to persist after a run that left part of the forum unread
    ///
    /// Leaves initial mode like [`SyncController::finish`] but keeps the
    /// start watermark, so posts in the unread part stay in scope.
    pub fn hold(&self) -> SyncState {
        SyncState {
            last_scrape_timestamp: self.watermark(),
            is_initial_run: false,
        }
    }
}
