//! Forum date normalization
//!
//! Dates are tried against a fixed, ranked list of recognizers; the first
//! one that produces a valid instant wins. Forum times carry no zone and are
//! taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Polish month names: genitive (as used in dates), nominative, abbreviated
const MONTHS: &[(&str, u32)] = &[
    ("stycznia", 1),
    ("styczeń", 1),
    ("sty", 1),
    ("lutego", 2),
    ("luty", 2),
    ("lut", 2),
    ("marca", 3),
    ("marzec", 3),
    ("mar", 3),
    ("kwietnia", 4),
    ("kwiecień", 4),
    ("kwi", 4),
    ("maja", 5),
    ("maj", 5),
    ("czerwca", 6),
    ("czerwiec", 6),
    ("cze", 6),
    ("lipca", 7),
    ("lipiec", 7),
    ("lip", 7),
    ("sierpnia", 8),
    ("sierpień", 8),
    ("sie", 8),
    ("września", 9),
    ("wrzesień", 9),
    ("wrz", 9),
    ("października", 10),
    ("październik", 10),
    ("paź", 10),
    ("listopada", 11),
    ("listopad", 11),
    ("lis", 11),
    ("grudnia", 12),
    ("grudzień", 12),
    ("gru", 12),
];

/// Numeric layouts, in priority order. Each must match the whole string.
const NUMERIC_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M",
    "%d-%m-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

type DateRecognizer = fn(&str) -> Option<DateTime<Utc>>;

const RECOGNIZERS: &[DateRecognizer] = &[parse_long_form, parse_numeric];

/// Parses a forum date string into a UTC instant
///
/// Returns `None` for anything no recognizer understands; callers treat
/// that as a missing date rather than substituting a default.
///
/// # Example
///
/// ```
/// use forum_harvest::extract::parse_forum_date;
///
/// let parsed = parse_forum_date("05 sierpnia 2024, 14:30").unwrap();
/// assert_eq!(parsed.to_rfc3339(), "2024-08-05T14:30:00+00:00");
/// assert!(parse_forum_date("wczoraj").is_none());
/// ```
pub fn parse_forum_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    RECOGNIZERS.iter().find_map(|recognize| recognize(text))
}

/// Looks up a month by name, ignoring case
pub fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| *month == lower)
        .map(|(_, number)| *number)
}

/// "05 sierpnia 2024, 14:30", anywhere inside the text
fn parse_long_form(text: &str) -> Option<DateTime<Utc>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(\d{1,2})\s+(\w+)\s+(\d{4}),?\s+(\d{1,2}):(\d{2})")
            .expect("long-form date pattern is valid")
    });

    let caps = re.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = month_number(&caps[2])?;
    let year: i32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

fn parse_numeric(text: &str) -> Option<DateTime<Utc>> {
    NUMERIC_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
