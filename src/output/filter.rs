//! Thread title filter over a saved archive

use crate::archive::{Archive, ThreadRecord};
use crate::storage::{read_json, write_json_atomic, PersistenceError};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Input file not found: {0}")]
    NotFound(String),
}

/// Either a full archive or a bare list of threads
#[derive(Deserialize)]
#[serde(untagged)]
enum ThreadsDocument {
    List(Vec<ThreadRecord>),
    Archive(Archive),
}

/// Keeps threads whose title contains any of `patterns`
pub fn filter_by_title<'a>(
    threads: &'a [ThreadRecord],
    patterns: &[String],
    case_sensitive: bool,
) -> Vec<&'a ThreadRecord> {
    let patterns: Vec<String> = if case_sensitive {
        patterns.to_vec()
    } else {
        patterns.iter().map(|p| p.to_lowercase()).collect()
    };

    threads
        .iter()
        .filter(|thread| {
            let title = if case_sensitive {
                thread.thread_title.clone()
            } else {
                thread.thread_title.to_lowercase()
            };
            patterns.iter().any(|p| title.contains(p.as_str()))
        })
        .collect()
}

/// Keeps threads whose title matches any of `patterns`, ignoring case
pub fn filter_by_regex<'a>(
    threads: &'a [ThreadRecord],
    patterns: &[String],
) -> Result<Vec<&'a ThreadRecord>, FilterError> {
    let compiled = patterns
        .iter()
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .collect::<Result<Vec<Regex>, _>>()?;

    Ok(threads
        .iter()
        .filter(|thread| compiled.iter().any(|re| re.is_match(&thread.thread_title)))
        .collect())
}

/// Reads the threads of an archive file, or of a bare JSON thread list
pub fn load_threads(path: &Path) -> Result<Vec<ThreadRecord>, FilterError> {
    match read_json::<ThreadsDocument>(path)? {
        Some(ThreadsDocument::List(threads)) => Ok(threads),
        Some(ThreadsDocument::Archive(archive)) => Ok(archive.threads),
        None => Err(FilterError::NotFound(path.display().to_string())),
    }
}

/// Filters `input` and writes the matches to `output` as a JSON array
///
/// Returns the matching threads.
pub fn write_filtered(
    input: &Path,
    output: &Path,
    patterns: &[String],
    use_regex: bool,
    case_sensitive: bool,
) -> Result<Vec<ThreadRecord>, FilterError> {
    let threads = load_threads(input)?;

    let found = if use_regex {
        filter_by_regex(&threads, patterns)?
    } else {
        filter_by_title(&threads, patterns, case_sensitive)
    };
    let matched: Vec<ThreadRecord> = found.into_iter().cloned().collect();

    write_json_atomic(output, &matched)?;
    tracing::info!(
        matched = matched.len(),
        total = threads.len(),
        output = %output.display(),
        "Filtered threads written"
    );

    Ok(matched)
}
