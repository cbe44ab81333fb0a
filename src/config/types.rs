use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Forum-Harvest
///
/// Every section and field is optional; a missing config file is the same
/// as an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub forum: ForumConfig,
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    pub filters: FilterConfig,
}

/// Where the forum lives and which threads to look at
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForumConfig {
    /// Forum root, used to resolve every relative path below
    pub base_url: String,

    /// Thread index of the section to harvest, relative to `base_url`
    pub index_path: String,

    /// Login page, relative to `base_url`
    pub login_path: String,

    /// Name recorded as `source_forum` in the archive
    pub source_name: String,

    /// Threads whose title contains any of these (case-insensitive) are
    /// never fetched
    pub skip_thread_titles: Vec<String>,

    /// Process at most this many threads per run (index order)
    pub max_threads: Option<usize>,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            base_url: "https://portalanaliz.pl/forum/".to_string(),
            index_path: "viewforum.php?f=3".to_string(),
            login_path: "ucp.php?mode=login".to_string(),
            source_name: "PortalAnaliz.pl".to_string(),
            skip_thread_titles: vec![
                "SPÓŁKA DO ANALIZY".to_string(),
                "DYSKUSJA OGÓLNA, MAKRO, WYDARZENIA".to_string(),
                "KOMUNIKATY ADMINÓW, INFO O NOWYCH ANALIZACH".to_string(),
            ],
            max_threads: None,
        }
    }
}

/// Request pacing, retries and limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Politeness delay between consecutive threads (seconds)
    pub delay_between_requests_sec: f64,

    /// Politeness delay between consecutive pages of one walk (milliseconds)
    pub page_delay_ms: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Extra attempts after a retryable fetch failure
    pub max_retries: u32,

    /// Backoff before the first retry, doubled on each further retry
    /// (milliseconds)
    pub retry_backoff_ms: u64,

    /// Hard cap on pages visited by a single walk
    pub max_pages_per_walk: usize,

    /// Overall run budget (seconds); absent means no deadline
    pub run_deadline_secs: Option<u64>,

    /// Number of complete login handshakes to try before giving up
    pub login_attempts: u32,

    /// Pause between login attempts (seconds)
    pub login_retry_delay_secs: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            delay_between_requests_sec: 2.0,
            page_delay_ms: 500,
            request_timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 1000,
            max_pages_per_walk: 1000,
            run_deadline_secs: None,
            login_attempts: 2,
            login_retry_delay_secs: 5,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn thread_delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_between_requests_sec.max(0.0))
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.run_deadline_secs.map(Duration::from_secs)
    }
}

/// Output file locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the sync state JSON file
    pub state_path: String,

    /// Path to the archive JSON file
    pub archive_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            state_path: "state.json".to_string(),
            archive_path: "scraped_data.json".to_string(),
        }
    }
}

/// Reserved content filters. Parsed and carried, not applied by the crawl.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub keywords: Vec<String>,
    pub target_users: Vec<String>,
}
