//! Forum-Harvest: an incremental forum archiver
//!
//! This crate logs into a session-authenticated forum, walks its paginated
//! thread index and thread pages, and merges newly discovered posts into a
//! deduplicated JSON archive. A persisted watermark keeps runs incremental.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Forum-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Pagination aborted: {0}")]
    Pagination(#[from] PaginationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::PersistenceError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredentials(&'static str),
}

/// Errors raised by the login handshake. All of them are fatal for a run.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No login form found at {url}")]
    FormNotFound { url: String },

    #[error("Login rejected by server: {0}")]
    Rejected(String),

    #[error("Still seeing login requirements after submitting credentials")]
    NotAuthenticated,

    #[error("Forum index not accessible after login (HTTP {status})")]
    AccessDenied { status: u16 },

    #[error("Request failed during login: {0}")]
    Fetch(#[from] FetchError),
}

/// Per-request failures
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Returns true if the request may succeed when sent again
    ///
    /// Timeouts, connection failures, 408, 429 and 5xx responses are
    /// retried. Everything else fails immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            Self::Body { .. } => false,
        }
    }

    /// The URL the failed request was sent to
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Network { url, .. }
            | Self::Body { url, .. } => url,
        }
    }
}

/// Walk-local guards that stop a pagination walk
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("Next-page link points back to already visited {url}")]
    Cycle { url: String },

    #[error("Walk exceeded {limit} pages at {url}")]
    PageLimit { limit: usize, url: String },
}

/// Result type alias for Forum-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use archive::{merge, Archive, PostRecord, ThreadRecord, ThreadStub};
pub use config::{Config, Credentials};
pub use crawler::{harvest, Harvester, RunOutcome};
pub use extract::{extract, PageKind};
pub use state::{SyncController, SyncMode, SyncState};
