//! Pre-dispatch URL filtering.
//!
//! Two independent predicates narrow the candidate set before any page is
//! fetched:
//!
//! | Predicate | Applied to | Keeps a URL when |
//! |-----------|------------|------------------|
//! | [`YearFilter`] | child sitemap URLs | it mentions a year in the configured range |
//! | [`TagFilter`] | article URLs | its first path segment is an allowed tag |
//!
//! Both are pure and deterministic.

use std::collections::HashSet;
use url::Url;

use crate::config::CrawlConfig;

/// Keeps URLs whose text contains any year in `[start, end]`.
#[derive(Debug, Clone)]
pub struct YearFilter {
    years: Vec<String>,
}

impl YearFilter {
    /// Filter for the inclusive year range `[start, end]`.
    ///
    /// # Arguments
    ///
    /// * `start` - First year kept
    /// * `end` - Last year kept; a range with `end < start` keeps nothing
    pub fn new(start: i32, end: i32) -> Self {
        Self {
            years: (start..=end).map(|y| y.to_string()).collect(),
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(config.start_year, config.end_year)
    }

    /// Whether `url` mentions any year in the range.
    ///
    /// The test is a plain substring match, so `sitemap-2025-03.xml` and
    /// `/2025/` both count for 2025.
    pub fn matches(&self, url: &str) -> bool {
        self.years.iter().any(|year| url.contains(year.as_str()))
    }

    /// Keep the URLs that [`YearFilter::matches`], preserving order.
    ///
    /// # Arguments
    ///
    /// * `urls` - Child sitemap URLs from the sitemap index
    ///
    /// # Returns
    ///
    /// The subset in range, in input order.
    pub fn apply(&self, urls: Vec<String>) -> Vec<String> {
        urls.into_iter().filter(|u| self.matches(u)).collect()
    }
}

/// Keeps URLs whose first path segment (case-folded) is in the allow-set.
///
/// An empty allow-set lets every URL through. Otherwise URLs that don't parse
/// or have no path segment are rejected.
#[derive(Debug, Clone)]
pub struct TagFilter {
    allowed: HashSet<String>,
}

impl TagFilter {
    /// Filter allowing the given lower-cased tags.
    ///
    /// # Arguments
    ///
    /// * `allowed` - Lower-cased first path segments to keep; empty keeps everything
    pub fn new(allowed: HashSet<String>) -> Self {
        Self { allowed }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(config.tag_set())
    }

    /// Whether the filter lets every URL through.
    pub fn is_noop(&self) -> bool {
        self.allowed.is_empty()
    }

    /// Whether `url`'s first path segment is allowed.
    ///
    /// Fails closed: unparseable URLs and URLs without a path segment are
    /// rejected unless the filter is a no-op.
    pub fn matches(&self, url: &str) -> bool {
        if self.is_noop() {
            return true;
        }
        extract_tag(url).is_some_and(|tag| self.allowed.contains(&tag))
    }

    /// Keep the article URLs under an allowed tag, preserving order.
    ///
    /// # Returns
    ///
    /// `urls` unchanged for a no-op filter, otherwise the matching subset.
    pub fn apply(&self, urls: Vec<String>) -> Vec<String> {
        if self.is_noop() {
            return urls;
        }
        urls.into_iter().filter(|u| self.matches(u)).collect()
    }
}

/// First non-empty path segment of `url`, lower-cased.
pub fn extract_tag(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path().trim_matches('/');
    if path.is_empty() {
        return None;
    }
    path.split('/').next().map(str::to_lowercase)
}
