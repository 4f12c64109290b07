//! Data models for extracted phrase mentions.
//!
//! This module defines the record type that flows from the content extractor
//! through the crawl orchestrator into the result store:
//! - [`ExtractionRecord`]: one phrase's mention count on one article
//!
//! A candidate article URL is a plain `String`; sitemap entries never outlive
//! the expansion step, so they carry no type of their own.

/// Title used when a page has neither an `<h1>` nor an `og:title` meta tag.
pub const NO_TITLE: &str = "No Title";

/// Publish date used when no structured date metadata is present.
pub const UNKNOWN_DATE: &str = "Unknown";

/// Mentions of one phrase within one article's body text.
///
/// The logical key is `(url, phrase)`: the store keeps at most one record per
/// pair and a later extraction replaces an earlier one. Records are only ever
/// produced for phrases that occur at least once, so `mentions` is always
/// positive for records coming out of the extractor.
///
/// # Fields
///
/// * `url` - The article URL the text was read from
/// * `title` - Headline text, or [`NO_TITLE`]
/// * `phrase` - The configured phrase that was counted
/// * `mentions` - Number of whole-word, case-insensitive occurrences
/// * `date_published` - `YYYY-MM-DD`, or [`UNKNOWN_DATE`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRecord {
    /// The article URL.
    pub url: String,
    /// The article headline.
    pub title: String,
    /// The phrase that was counted.
    pub phrase: String,
    /// Number of whole-word occurrences of `phrase` in the body text.
    pub mentions: u32,
    /// Date portion of the published timestamp.
    pub date_published: String,
}

impl ExtractionRecord {
    /// The `(url, phrase)` pair that identifies this record in the store.
    pub fn key(&self) -> (&str, &str) {
        (&self.url, &self.phrase)
    }

    /// Whether the publish date could not be discovered.
    pub fn has_unknown_date(&self) -> bool {
        self.date_published == UNKNOWN_DATE
    }
}
