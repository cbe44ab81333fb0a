//! Harvest coordinator - main run orchestration logic
//!
//! This module contains the run loop that ties the pieces together:
//! - Loading the sync state and the archive
//! - Walking the thread index and selecting threads
//! - Walking each selected thread with politeness delays
//! - Handing posts to the sync controller and the merger
//! - Persisting the archive, then the state

use crate::archive::{ThreadRecord, ThreadStub};
use crate::config::{Config, Credentials};
use crate::crawler::fetcher::ForumClient;
use crate::crawler::session::{login_with_retry, ForumEndpoints};
use crate::crawler::walker::{Walk, WalkError, WalkLimits};
use crate::extract::PageKind;
use crate::output::{FailedThread, RunOutcome, RunReport};
use crate::state::{SyncController, TitleExclusion};
use crate::storage::{open_store, JsonFileStore, RunStore};
use crate::Result;
use chrono::Utc;
use std::collections::HashSet;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Main harvest coordinator structure
pub struct Harvester<S: RunStore = JsonFileStore> {
    config: Config,
    client: ForumClient,
    endpoints: ForumEndpoints,
    store: S,
    exclusion: TitleExclusion,
}

impl Harvester<JsonFileStore> {
    /// Creates a harvester writing to the configured JSON files
    pub fn new(config: Config) -> Result<Self> {
        let client = ForumClient::new(&config.crawler)?;
        let store = open_store(&config.output);
        Self::with_parts(config, client, store)
    }
}

impl<S: RunStore> Harvester<S> {
    /// Creates a harvester from an existing client and store
    pub fn with_parts(config: Config, client: ForumClient, store: S) -> Result<Self> {
        let endpoints = ForumEndpoints::from_config(&config.forum)?;
        let exclusion = TitleExclusion::new(config.forum.skip_thread_titles.iter().cloned());

        Ok(Self {
            config,
            client,
            endpoints,
            store,
            exclusion,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Logs in, retrying up to the configured number of attempts
    pub async fn login(&self, credentials: &Credentials, cancel: &CancellationToken) -> Result<()> {
        login_with_retry(
            &self.client,
            &self.endpoints,
            credentials,
            self.config.crawler.login_attempts,
            std::time::Duration::from_secs(self.config.crawler.login_retry_delay_secs),
            cancel,
        )
        .await?;
        Ok(())
    }

    /// Runs one harvest over an already authenticated session
    ///
    /// # Flow
    ///
    /// 1. Load state and archive
    /// 2. Walk the thread index; drop duplicate, excluded and over-limit threads
    /// 3. Walk each remaining thread and keep its in-scope posts
    /// 4. Merge, write the archive if it changed, then write the state
    ///
    /// A thread whose walk fails on a fetch is left out of this run. A
    /// pagination guard keeps the posts collected before it fired.
    /// Cancellation or the run deadline stop the run between fetches; what
    /// was collected is merged but the watermark stays where it was. The
    /// watermark is also held when the index walk stopped early or a thread
    /// failed, since unread threads may hold posts older than the newest
    /// one seen.
    pub async fn run(&self, force_full: bool, cancel: &CancellationToken) -> Result<RunReport> {
        let started_at = Utc::now();
        let state = self.store.load_state()?;
        let mut archive = self.store.load_archive(&self.config.forum.source_name)?;
        let mut controller = SyncController::start(state, force_full);

        info!(
            mode = %controller.mode(),
            watermark = %controller.watermark().to_rfc3339(),
            archived_threads = archive.threads.len(),
            "Starting harvest"
        );

        let run_token = cancel.child_token();
        let _deadline = DeadlineGuard::arm(&self.config, &run_token);
        let limits = WalkLimits {
            max_pages: self.config.crawler.max_pages_per_walk,
            page_delay: self.config.crawler.page_delay(),
        };

        // Thread index
        let index_walk = Walk::new(
            &self.client,
            self.endpoints.index.clone(),
            PageKind::ThreadIndex,
            limits,
            &run_token,
        )
        .collect()
        .await;

        let index_error = index_walk.error.as_ref().map(|e| {
            warn!(url = %self.endpoints.index, error = %e, "Index walk incomplete, using threads found so far");
            e.to_string()
        });
        let mut interrupted = index_walk.cancelled;

        let stubs = unique_stubs(index_walk.threads);
        let threads_discovered = stubs.len();
        let (selected, threads_skipped, threads_over_limit) = self.select_threads(stubs);

        info!(
            pages = index_walk.pages,
            threads_discovered,
            threads_skipped,
            threads_selected = selected.len(),
            "Thread index walked"
        );

        // Threads
        let mut records = Vec::new();
        let mut threads_failed = Vec::new();
        let mut posts_skipped = 0;

        for (position, stub) in selected.iter().enumerate() {
            if interrupted || run_token.is_cancelled() {
                interrupted = true;
                break;
            }

            if position > 0 {
                tokio::select! {
                    _ = run_token.cancelled() => {
                        interrupted = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.config.crawler.thread_delay()) => {}
                }
            }

            let entry = match Url::parse(&stub.url) {
                Ok(url) => url,
                Err(e) => {
                    warn!(thread_id = %stub.id, url = %stub.url, error = %e, "Thread URL unusable");
                    threads_failed.push(failed(stub, e.to_string()));
                    continue;
                }
            };

            debug!(thread_id = %stub.id, title = %stub.title, "Walking thread");
            let walk = Walk::new(&self.client, entry, PageKind::ThreadDetail, limits, &run_token)
                .collect()
                .await;
            posts_skipped += walk.skipped;
            interrupted |= walk.cancelled;

            match &walk.error {
                Some(WalkError::Fetch(e)) => {
                    warn!(thread_id = %stub.id, url = %stub.url, error = %e, "Thread skipped");
                    threads_failed.push(failed(stub, e.to_string()));
                    continue;
                }
                Some(WalkError::Pagination(e)) => {
                    warn!(thread_id = %stub.id, url = %stub.url, error = %e, "Thread pagination aborted, keeping collected posts");
                }
                None => {}
            }

            let extracted = walk.posts.len();
            let posts = controller.filter_posts(walk.posts);
            debug!(
                thread_id = %stub.id,
                pages = walk.pages,
                extracted,
                in_scope = posts.len(),
                "Thread walked"
            );

            if !posts.is_empty() {
                records.push(ThreadRecord::from_stub(stub, posts));
            }
        }

        let threads_with_new_posts = records.len();
        let new_posts = controller.in_scope_count();

        // Archive first, then state
        let merged = archive.merge_threads(records);
        let archive_written = merged.changed();
        if archive_written {
            archive.scraped_timestamp_utc = Some(Utc::now());
            self.store.save_archive(&archive)?;
            info!(
                threads_added = merged.threads_added,
                threads_extended = merged.threads_extended,
                posts_appended = merged.posts_appended,
                "Archive updated"
            );
        } else {
            info!("No new posts, archive unchanged");
        }

        let outcome = if interrupted {
            RunOutcome::Interrupted
        } else if index_error.is_some() || !threads_failed.is_empty() {
            RunOutcome::Incomplete
        } else {
            RunOutcome::Completed
        };
        let next_state = match outcome {
            RunOutcome::Completed => controller.finish(),
            RunOutcome::Incomplete => {
                warn!(
                    threads_failed = threads_failed.len(),
                    index_complete = index_error.is_none(),
                    "Part of the forum was not read, watermark not advanced"
                );
                controller.hold()
            }
            RunOutcome::Interrupted => {
                warn!("Run interrupted, watermark not advanced");
                controller.abandon()
            }
        };
        self.store.save_state(&next_state)?;

        Ok(RunReport {
            mode: controller.mode(),
            outcome,
            threads_discovered,
            threads_skipped,
            threads_over_limit,
            threads_failed,
            index_error,
            threads_with_new_posts,
            new_posts,
            posts_appended: merged.posts_appended,
            posts_skipped,
            previous_watermark: controller.watermark(),
            watermark: next_state.last_scrape_timestamp,
            archive_written,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Applies the title denylist, then the thread limit
    ///
    /// Returns the selected stubs, the excluded count and the over-limit count.
    fn select_threads(&self, stubs: Vec<ThreadStub>) -> (Vec<ThreadStub>, usize, usize) {
        let mut skipped = 0;
        let mut selected: Vec<ThreadStub> = stubs
            .into_iter()
            .filter(|stub| match self.exclusion.matching_pattern(&stub.title) {
                Some(pattern) => {
                    info!(thread_id = %stub.id, title = %stub.title, pattern, "Skipping excluded thread");
                    skipped += 1;
                    false
                }
                None => true,
            })
            .collect();

        let mut over_limit = 0;
        if let Some(limit) = self.config.forum.max_threads {
            if selected.len() > limit {
                over_limit = selected.len() - limit;
                selected.truncate(limit);
                info!(limit, over_limit, "Thread limit reached");
            }
        }

        (selected, skipped, over_limit)
    }
}

/// Logs in and runs one harvest with the configured JSON store
///
/// This is the main entry point of the crate.
pub async fn run_harvest(
    config: Config,
    credentials: &Credentials,
    force_full: bool,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let harvester = Harvester::new(config)?;
    harvester.login(credentials, cancel).await?;
    harvester.run(force_full, cancel).await
}

/// Keeps the first stub for each thread id, in index order
fn unique_stubs(stubs: Vec<ThreadStub>) -> Vec<ThreadStub> {
    let mut seen = HashSet::new();
    stubs
        .into_iter()
        .filter(|stub| seen.insert(stub.id.clone()))
        .collect()
}

fn failed(stub: &ThreadStub, error: String) -> FailedThread {
    FailedThread {
        thread_id: stub.id.clone(),
        url: stub.url.clone(),
        error,
    }
}

/// Cancels the run token when the configured deadline passes
struct DeadlineGuard(Option<JoinHandle<()>>);

impl DeadlineGuard {
    fn arm(config: &Config, token: &CancellationToken) -> Self {
        let handle = config.crawler.run_deadline().map(|deadline| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(deadline_secs = deadline.as_secs(), "Run deadline reached, stopping");
                token.cancel();
            })
        });
        Self(handle)
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}
