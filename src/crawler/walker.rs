//! Pagination walker
//!
//! A [`Walk`] follows "next page" links from an entry URL, one fetch at a
//! time, handing each extracted page to the caller as it arrives. Every
//! walk keeps its own visited set and page counter, so starting a new walk
//! from the same URL always starts over.

use crate::archive::{PostRecord, ThreadStub};
use crate::crawler::fetcher::ForumClient;
use crate::extract::{extract, ExtractedPage, ExtractedRecords, PageKind};
use crate::{FetchError, PaginationError};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Why a walk stopped before running out of pages
#[derive(Debug, Error)]
pub enum WalkError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

/// Per-walk pacing and bounds
#[derive(Debug, Clone, Copy)]
pub struct WalkLimits {
    /// Pages fetched before the walk is aborted
    pub max_pages: usize,

    /// Pause between consecutive page fetches
    pub page_delay: Duration,
}

/// One traversal of a paginated sequence
pub struct Walk<'a> {
    client: &'a ForumClient,
    kind: PageKind,
    limits: WalkLimits,
    cancel: &'a CancellationToken,
    next: Option<Url>,
    visited: HashSet<String>,
    pages: usize,
    cancelled: bool,
}

impl<'a> Walk<'a> {
    pub fn new(
        client: &'a ForumClient,
        entry: Url,
        kind: PageKind,
        limits: WalkLimits,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            kind,
            limits,
            cancel,
            next: Some(entry),
            visited: HashSet::new(),
            pages: 0,
            cancelled: false,
        }
    }

    /// Fetches and extracts the next page
    ///
    /// Returns `None` once no next link remains or the walk was cancelled.
    /// An error ends the walk; the following call returns `None`.
    pub async fn next_page(&mut self) -> Option<Result<ExtractedPage, WalkError>> {
        let url = self.next.take()?;

        if self.cancel.is_cancelled() {
            self.cancelled = true;
            return None;
        }

        if self.visited.contains(&page_key(&url)) {
            return Some(Err(PaginationError::Cycle {
                url: url.to_string(),
            }
            .into()));
        }

        if self.pages >= self.limits.max_pages {
            return Some(Err(PaginationError::PageLimit {
                limit: self.limits.max_pages,
                url: url.to_string(),
            }
            .into()));
        }

        if self.pages > 0 {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.cancelled = true;
                    return None;
                }
                _ = tokio::time::sleep(self.limits.page_delay) => {}
            }
        }

        debug!(url = %url, kind = %self.kind, page = self.pages + 1, "Fetching page");
        let fetched = match self.client.get_cancellable(&url, self.cancel).await {
            Ok(fetched) => fetched,
            Err(e) if self.cancel.is_cancelled() => {
                debug!(url = %url, error = %e, "Fetch abandoned on cancellation");
                self.cancelled = true;
                return None;
            }
            Err(e) => return Some(Err(e.into())),
        };

        self.visited.insert(page_key(&url));
        self.visited.insert(page_key(&fetched.url));
        self.pages += 1;

        let page = extract(&fetched.body, self.kind, &fetched.url);
        debug!(
            url = %fetched.url,
            records = page.records.len(),
            skipped = page.skipped,
            has_next = page.next_page.is_some(),
            "Extracted page"
        );

        self.next = page.next_page.clone();
        Some(Ok(page))
    }

    /// Pages fetched so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Whether the walk stopped because of cancellation
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Drains the walk, keeping everything collected before a failure
    pub async fn collect(mut self) -> WalkOutcome {
        let mut outcome = WalkOutcome::default();

        while let Some(step) = self.next_page().await {
            match step {
                Ok(page) => {
                    outcome.skipped += page.skipped;
                    match page.records {
                        ExtractedRecords::Threads(threads) => outcome.threads.extend(threads),
                        ExtractedRecords::Posts(posts) => outcome.posts.extend(posts),
                    }
                }
                Err(e) => {
                    warn!(kind = %self.kind, pages = self.pages, error = %e, "Walk stopped early");
                    outcome.error = Some(e);
                }
            }
        }

        outcome.pages = self.pages;
        outcome.cancelled = self.cancelled;
        outcome
    }
}

/// Everything one walk produced
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Thread stubs from index pages, in page order
    pub threads: Vec<ThreadStub>,

    /// Accepted posts from thread pages, in page order
    pub posts: Vec<PostRecord>,

    pub pages: usize,

    /// Post containers dropped by the extractor
    pub skipped: usize,

    /// Set when the walk ended on a fetch or pagination error
    pub error: Option<WalkError>,

    pub cancelled: bool,
}

/// Visited-set key: the URL without its fragment
fn page_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
