//! "Next page" link recognition
//!
//! Forum skins render pagination differently. Each recognizer below handles
//! one markup shape; they are tried in order and the first hit wins. No hit
//! means the current page is the last one.

use scraper::{ElementRef, Html, Selector};
use url::Url;

type NextPageRecognizer = fn(&Html, &Url) -> Option<Url>;

/// Recognizers in priority order, with a name for logging
const RECOGNIZERS: &[(&str, NextPageRecognizer)] = &[
    ("arrow", next_arrow),
    ("labelled", labelled_next_link),
    ("numbered", numbered_next_link),
];

/// Texts that mark an anchor as the "next" link
const NEXT_LABELS: &[&str] = &["Następ", "Next", "»"];

/// Finds the link to the page after this one
///
/// # Arguments
///
/// * `document` - The parsed page
/// * `page_url` - URL the page was served from, for resolving relative links
pub fn find_next_page(document: &Html, page_url: &Url) -> Option<Url> {
    RECOGNIZERS.iter().find_map(|(name, recognize)| {
        let next = recognize(document, page_url)?;
        tracing::trace!("Next page via {} link: {}", name, next);
        Some(next)
    })
}

/// `<li class="arrow next"><a href="...">`
fn next_arrow(document: &Html, page_url: &Url) -> Option<Url> {
    let selector = Selector::parse("li.arrow.next a[href]").ok()?;
    document
        .select(&selector)
        .find_map(|a| resolve_href(a.value().attr("href")?, page_url))
}

/// An anchor inside the pagination block labelled "Następna", "Next" or "»"
fn labelled_next_link(document: &Html, page_url: &Url) -> Option<Url> {
    let container = pagination_container(document)?;
    let anchors = Selector::parse("a[href]").ok()?;

    container.select(&anchors).find_map(|a| {
        let text = element_text(&a);
        if NEXT_LABELS.iter().any(|label| text.contains(label)) {
            resolve_href(a.value().attr("href")?, page_url)
        } else {
            None
        }
    })
}

/// The anchor numbered one past the active page
fn numbered_next_link(document: &Html, page_url: &Url) -> Option<Url> {
    let container = pagination_container(document)?;

    let active = ["li.active", "strong"].iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        container.select(&selector).next()
    })?;
    let current: u32 = element_text(&active).parse().ok()?;
    let wanted = current.checked_add(1)?.to_string();

    let anchors = Selector::parse("a[href]").ok()?;
    container.select(&anchors).find_map(|a| {
        if element_text(&a) == wanted {
            resolve_href(a.value().attr("href")?, page_url)
        } else {
            None
        }
    })
}

fn pagination_container(document: &Html) -> Option<ElementRef<'_>> {
    ["div.pagination", "ul.pagination"].iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        document.select(&selector).next()
    })
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolves an href against the page URL, skipping non-navigational links
pub(crate) fn resolve_href(href: &str, page_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let resolved = page_url.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}
