//! Crawler module for forum fetching and run coordination
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with a shared cookie session and retry logic
//! - The login handshake
//! - Pagination walks over index and thread pages
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod session;
mod walker;

pub use coordinator::{run_harvest, Harvester};
pub use fetcher::{build_http_client, FetchedPage, ForumClient};
pub use session::{
    check_access, login, login_error_message, login_with_retry, parse_login_form, AccessCheck,
    ForumEndpoints, LoginForm,
};
pub use walker::{Walk, WalkError, WalkLimits, WalkOutcome};

pub use crate::output::{RunOutcome, RunReport};

use crate::config::{Config, Credentials};
use crate::Result;
use tokio_util::sync::CancellationToken;

/// Runs a complete harvest
///
/// This is the main entry point for a run. It will:
/// 1. Build the HTTP client and open the JSON store
/// 2. Log in
/// 3. Walk the thread index and every selected thread
/// 4. Merge new posts into the archive
/// 5. Persist the archive, then the sync state
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `credentials` - Forum login
/// * `force_full` - Ignore the saved watermark for this run
/// * `cancel` - Stops the run between fetches when triggered
pub async fn harvest(
    config: Config,
    credentials: &Credentials,
    force_full: bool,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    run_harvest(config, credentials, force_full, cancel).await
}
