/// Case-insensitive substring denylist for thread titles
///
/// Applied to index entries before any thread page is fetched.
#[derive(Debug, Clone, Default)]
pub struct TitleExclusion {
    patterns: Vec<(String, String)>,
}

impl TitleExclusion {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(Into::into)
            .map(|p| (p.to_lowercase(), p))
            .collect();
        Self { patterns }
    }

    /// Returns the configured pattern that excludes `title`, if any
    pub fn matching_pattern(&self, title: &str) -> Option<&str> {
        let title = title.to_lowercase();
        self.patterns
            .iter()
            .find(|(lower, _)| title.contains(lower.as_str()))
            .map(|(_, original)| original.as_str())
    }

    pub fn is_excluded(&self, title: &str) -> bool {
        self.matching_pattern(title).is_some()
    }
}
