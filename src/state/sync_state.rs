use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Persisted crawl watermark
///
/// Read once at run start, written once at run end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Posts at or before this instant count as already processed
    #[serde(rename = "last_scrape_timestamp_utc")]
    pub last_scrape_timestamp: DateTime<Utc>,

    /// True until the first run completes
    #[serde(default)]
    pub is_initial_run: bool,
}

impl SyncState {
    /// Watermark used when no state exists yet
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// State for a forum that has never been harvested
    pub fn initial() -> Self {
        Self {
            last_scrape_timestamp: Self::epoch(),
            is_initial_run: true,
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::initial()
    }
}
