//! Thread page extraction
//!
//! Every post container becomes a [`PostCandidate`]; only candidates with
//! an id, author, date and content become records. Anything less is more
//! likely an unfamiliar markup variant than a real post without an author,
//! so it is skipped instead of guessed.

use crate::archive::PostRecord;
use crate::extract::dates::parse_forum_date;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Author selectors, in priority order
const AUTHOR_SELECTORS: &[&str] = &[
    "dl.postprofile dt strong",
    "dl.postprofile dt a",
    "p.author strong",
    "p.author a",
];

/// Why a post container was not turned into a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExtractionSkip {
    #[error("no post id")]
    MissingId,

    #[error("no author")]
    MissingAuthor,

    #[error("no content")]
    MissingContent,

    #[error("no recognizable date")]
    MissingDate,
}

/// Post fields as found on the page, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostCandidate {
    pub post_id: Option<String>,
    pub author: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub content: Option<String>,
}

impl PostCandidate {
    /// Accepts the candidate only if every field resolved
    pub fn into_record(self) -> Result<PostRecord, ExtractionSkip> {
        let post_id = non_empty(self.post_id).ok_or(ExtractionSkip::MissingId)?;
        let author = non_empty(self.author).ok_or(ExtractionSkip::MissingAuthor)?;
        let content = non_empty(self.content).ok_or(ExtractionSkip::MissingContent)?;
        let timestamp = self.timestamp.ok_or(ExtractionSkip::MissingDate)?;

        Ok(PostRecord::new(post_id, author, timestamp, content))
    }
}

/// Extracts accepted posts from a thread page
///
/// Returns the accepted records in page order and the number of skipped
/// containers.
pub fn extract_posts(document: &Html) -> (Vec<PostRecord>, usize) {
    let mut posts = Vec::new();
    let mut skipped = 0;

    for container in post_containers(document) {
        let candidate = read_candidate(&container);
        let label = candidate.post_id.clone();

        match candidate.into_record() {
            Ok(post) => posts.push(post),
            Err(reason) => {
                skipped += 1;
                tracing::debug!(
                    post_id = label.as_deref().unwrap_or("?"),
                    "Skipping post: {}",
                    reason
                );
            }
        }
    }

    (posts, skipped)
}

/// Reads all post fields from one container
pub fn read_candidate(container: &ElementRef<'_>) -> PostCandidate {
    PostCandidate {
        post_id: post_id(container),
        author: author(container),
        timestamp: post_date(container),
        content: content(container),
    }
}

/// `div.post`, else divs whose id looks like `p<digits>`
fn post_containers(document: &Html) -> Vec<ElementRef<'_>> {
    if let Ok(selector) = Selector::parse("div.post") {
        let found: Vec<_> = document.select(&selector).collect();
        if !found.is_empty() {
            return found;
        }
    }

    let Ok(selector) = Selector::parse(r#"div[id^="p"]"#) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter(|div| div.value().id().and_then(numeric_post_id).is_some())
        .collect()
}

fn numeric_post_id(id: &str) -> Option<String> {
    let digits = id.strip_prefix('p')?;
    (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then(|| digits.to_string())
}

fn post_id(container: &ElementRef<'_>) -> Option<String> {
    if let Some(id) = container.value().id().and_then(numeric_post_id) {
        return Some(id);
    }

    let selector = Selector::parse("a[name]").ok()?;
    container
        .select(&selector)
        .filter_map(|a| a.value().attr("name"))
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}

fn author(container: &ElementRef<'_>) -> Option<String> {
    AUTHOR_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        container
            .select(&selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .find(|name| !name.is_empty())
    })
}

/// Date from the author line: a `<time datetime>` if present, else the
/// text after `»`
fn post_date(container: &ElementRef<'_>) -> Option<DateTime<Utc>> {
    let line_selector = Selector::parse("p.author").ok()?;
    let line = container.select(&line_selector).next()?;

    if let Ok(time_selector) = Selector::parse("time[datetime]") {
        let machine = line
            .select(&time_selector)
            .filter_map(|t| t.value().attr("datetime"))
            .find_map(|dt| DateTime::parse_from_rfc3339(dt.trim()).ok());
        if let Some(dt) = machine {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let text = line.text().collect::<String>();
    let (_, after) = text.split_once('»')?;
    let date_text = after.trim_start().lines().next()?.trim();
    parse_forum_date(date_text)
}

/// Plain text of `div.content` with quoted replies left out
fn content(container: &ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse("div.content").ok()?;
    let body = container.select(&selector).next()?;
    Some(text_without_quotes(&body))
}

fn text_without_quotes(element: &ElementRef<'_>) -> String {
    let root = element.id();
    let mut parts = Vec::new();

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let quoted = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != root)
            .any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|el| el.name() == "blockquote")
                    .unwrap_or(false)
            });

        let piece = text.trim();
        if !quoted && !piece.is_empty() {
            parts.push(piece);
        }
    }

    parts.join(" ")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
