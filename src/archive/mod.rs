//! Archive records and the append-only merge
//!
//! The archive is the durable unit of this crate: an ordered list of
//! threads, each holding its posts in discovery order. Records are typed
//! here once; the JSON field-name aliases older archives used are resolved
//! during deserialization so the rest of the crate sees a single shape.

mod merge;

pub use merge::{merge, MergeStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Post bodies are cut to this many characters
pub const MAX_CONTENT_CHARS: usize = 9500;

/// Author recorded for a thread that has no accepted posts yet
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// A thread as listed on the forum index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStub {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// One forum post
///
/// `post_id` is only unique inside its owning thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    #[serde(alias = "id")]
    pub post_id: String,

    #[serde(alias = "user", alias = "username")]
    pub author: String,

    #[serde(rename = "timestamp_utc", alias = "timestamp", alias = "date")]
    pub timestamp: DateTime<Utc>,

    #[serde(alias = "text", alias = "body")]
    pub content: String,
}

impl PostRecord {
    /// Builds a post, truncating `content` to [`MAX_CONTENT_CHARS`]
    pub fn new(
        post_id: impl Into<String>,
        author: impl Into<String>,
        timestamp: DateTime<Utc>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            post_id: post_id.into(),
            author: author.into(),
            timestamp,
            content: truncate_chars(content.into(), MAX_CONTENT_CHARS),
        }
    }
}

/// An archived thread with its posts in discovery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    #[serde(alias = "id")]
    pub thread_id: String,

    #[serde(alias = "title", alias = "name")]
    pub thread_title: String,

    #[serde(alias = "url", default)]
    pub thread_url: String,

    #[serde(default = "unknown_author")]
    pub initial_post_author: String,

    #[serde(default)]
    pub posts: Vec<PostRecord>,
}

impl ThreadRecord {
    /// Wraps the posts found for an index entry into an archive record
    ///
    /// The initial author is the author of the first post handed in.
    pub fn from_stub(stub: &ThreadStub, posts: Vec<PostRecord>) -> Self {
        let initial_post_author = posts
            .first()
            .map(|p| p.author.clone())
            .unwrap_or_else(unknown_author);

        Self {
            thread_id: stub.id.clone(),
            thread_title: stub.title.clone(),
            thread_url: stub.url.clone(),
            initial_post_author,
            posts,
        }
    }
}

/// The persisted archive document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub scraped_timestamp_utc: Option<DateTime<Utc>>,

    #[serde(default)]
    pub source_forum: String,

    #[serde(default)]
    pub threads: Vec<ThreadRecord>,
}

impl Archive {
    pub fn empty(source_forum: impl Into<String>) -> Self {
        Self {
            scraped_timestamp_utc: None,
            source_forum: source_forum.into(),
            threads: Vec::new(),
        }
    }

    pub fn thread(&self, thread_id: &str) -> Option<&ThreadRecord> {
        self.threads.iter().find(|t| t.thread_id == thread_id)
    }

    pub fn post_count(&self) -> usize {
        self.threads.iter().map(|t| t.posts.len()).sum()
    }
}

fn unknown_author() -> String {
    UNKNOWN_AUTHOR.to_string()
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}

// Fresh archives were historically written with an empty string here.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}
