//! Page extraction
//!
//! Turns raw forum HTML into typed records. Extraction is a pure function
//! of the page content and its kind:
//! - thread index pages yield [`ThreadStub`]s
//! - thread pages yield accepted [`PostRecord`]s
//!
//! Both kinds also report the link to the following page, if any.

mod dates;
mod detail;
mod index;
mod pagination;

pub use dates::{month_number, parse_forum_date};
pub use detail::{extract_posts, read_candidate, ExtractionSkip, PostCandidate};
pub use index::{extract_thread_stubs, thread_id};
pub use pagination::find_next_page;

use crate::archive::{PostRecord, ThreadStub};
use scraper::Html;
use std::fmt;
use url::Url;

/// Which layout a page is expected to have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// A forum section listing threads
    ThreadIndex,

    /// One page of a thread's posts
    ThreadDetail,
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadIndex => write!(f, "thread-index"),
            Self::ThreadDetail => write!(f, "thread-detail"),
        }
    }
}

/// Records found on a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedRecords {
    Threads(Vec<ThreadStub>),
    Posts(Vec<PostRecord>),
}

impl ExtractedRecords {
    pub fn len(&self) -> usize {
        match self {
            Self::Threads(threads) => threads.len(),
            Self::Posts(posts) => posts.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of extracting one page
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub records: ExtractedRecords,

    /// Absolute URL of the following page
    pub next_page: Option<Url>,

    /// Containers dropped because a required field was missing
    pub skipped: usize,
}

/// Extracts records and the next-page link from a page
///
/// # Arguments
///
/// * `content` - Raw HTML
/// * `kind` - The layout the page is expected to have
/// * `page_url` - Final URL the page was served from
///
/// # Example
///
/// ```
/// use forum_harvest::extract::{extract, ExtractedRecords, PageKind};
/// use url::Url;
///
/// let html = r#"<a class="topictitle" href="viewtopic.php?t=9">XTB</a>"#;
/// let url = Url::parse("https://forum.example/viewforum.php?f=3").unwrap();
/// let page = extract(html, PageKind::ThreadIndex, &url);
/// assert!(matches!(page.records, ExtractedRecords::Threads(ref t) if t.len() == 1));
/// assert!(page.next_page.is_none());
/// ```
pub fn extract(content: &str, kind: PageKind, page_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(content);

    let (records, skipped) = match kind {
        PageKind::ThreadIndex => (
            ExtractedRecords::Threads(extract_thread_stubs(&document, page_url)),
            0,
        ),
        PageKind::ThreadDetail => {
            let (posts, skipped) = extract_posts(&document);
            (ExtractedRecords::Posts(posts), skipped)
        }
    };

    ExtractedPage {
        records,
        next_page: find_next_page(&document, page_url),
        skipped,
    }
}
