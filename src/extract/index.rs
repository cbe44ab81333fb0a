//! Thread index extraction

use crate::archive::ThreadStub;
use crate::extract::pagination::resolve_href;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Thread title link selectors, most specific skin first
const THREAD_LINK_SELECTORS: &[&str] = &["a.topictitle", "dt a.topictitle", "h3 a.topictitle"];

/// Link texts that belong to navigation, not threads
const NAVIGATION_TITLES: &[&str] = &["Następny", "Poprzedni", "Next", "Previous"];

/// Extracts the thread list from an index page
///
/// Titled thread links are looked up with the ranked selectors; if none
/// match, any link to `viewtopic.php` carrying a `t=<id>` parameter is
/// used instead. Thread ids are unique in the result (first wins).
pub fn extract_thread_stubs(document: &Html, page_url: &Url) -> Vec<ThreadStub> {
    let links = titled_thread_links(document).unwrap_or_else(|| viewtopic_links(document));

    let mut seen = HashSet::new();
    let mut stubs = Vec::new();

    for link in links {
        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() || NAVIGATION_TITLES.contains(&title.as_str()) {
            continue;
        }

        let Some(url) = link
            .value()
            .attr("href")
            .and_then(|href| resolve_href(href, page_url))
        else {
            continue;
        };

        let Some(id) = thread_id(&url) else {
            tracing::debug!("Thread link without id skipped: {}", url);
            continue;
        };

        if seen.insert(id.clone()) {
            stubs.push(ThreadStub {
                id,
                title,
                url: url.to_string(),
            });
        }
    }

    stubs
}

/// Extracts the numeric `t` query parameter of a thread URL
pub fn thread_id(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "t")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
}

fn titled_thread_links(document: &Html) -> Option<Vec<ElementRef<'_>>> {
    THREAD_LINK_SELECTORS.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        let links: Vec<_> = document.select(&selector).collect();
        (!links.is_empty()).then_some(links)
    })
}

fn viewtopic_links(document: &Html) -> Vec<ElementRef<'_>> {
    let Ok(selector) = Selector::parse("a[href*='viewtopic.php']") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|a| {
            a.value()
                .attr("href")
                .map(|href| href.contains("t="))
                .unwrap_or(false)
        })
        .collect()
}
