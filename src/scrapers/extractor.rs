//! Title, body, date and phrase-count extraction.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use super::document::{ElementMatch, ParsedDocument};
use crate::config::CrawlConfig;
use crate::models::{ExtractionRecord, NO_TITLE, UNKNOWN_DATE};

/// Class names that mark an element as holding the article body.
static BODY_CLASS: Lazy<Regex> = Lazy::new(|| Regex::new("article|content").unwrap());

const BODY_TAGS: &[&str] = &["article", "div", "section"];

/// Counts whole-word, case-insensitive occurrences of one literal phrase.
#[derive(Debug, Clone)]
struct PhraseCounter {
    phrase: String,
    pattern: Regex,
}

impl PhraseCounter {
    fn new(phrase: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase)))?;
        Ok(Self {
            phrase: phrase.to_string(),
            pattern,
        })
    }

    fn count(&self, text: &str) -> u32 {
        u32::try_from(self.pattern.find_iter(text).count()).unwrap_or(u32::MAX)
    }
}

/// Produces [`ExtractionRecord`]s from rendered article markup.
///
/// Built once per run from the configured phrases and body threshold, then
/// shared by every page fetch.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    counters: Vec<PhraseCounter>,
    min_body_chars: usize,
}

impl ContentExtractor {
    pub fn new<'a>(
        phrases: impl IntoIterator<Item = &'a str>,
        min_body_chars: usize,
    ) -> Result<Self, regex::Error> {
        let counters = phrases
            .into_iter()
            .map(PhraseCounter::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            counters,
            min_body_chars,
        })
    }

    pub fn from_config(config: &CrawlConfig) -> Result<Self, regex::Error> {
        Self::new(config.active_phrases(), config.min_body_chars)
    }

    /// Number of phrases being counted.
    pub fn phrase_count(&self) -> usize {
        self.counters.len()
    }

    /// Extract one record per phrase that occurs in the article body.
    ///
    /// Returns nothing when no body element qualifies; phrases that never
    /// occur are left out rather than reported with a zero count.
    #[instrument(level = "debug", skip(self, html))]
    pub fn extract(&self, html: &str, url: &str) -> Vec<ExtractionRecord> {
        let doc = ParsedDocument::parse(html);

        let Some(body) = body_text(&doc, self.min_body_chars) else {
            debug!(%url, "No article body above threshold");
            return Vec::new();
        };

        let title = extract_title(&doc);
        let date_published = extract_publish_date(&doc);

        self.counters
            .iter()
            .filter_map(|counter| {
                let mentions = counter.count(&body);
                (mentions > 0).then(|| ExtractionRecord {
                    url: url.to_string(),
                    title: title.clone(),
                    phrase: counter.phrase.clone(),
                    mentions,
                    date_published: date_published.clone(),
                })
            })
            .collect()
    }
}

/// Text of the first body candidate longer than `min_chars` characters.
fn body_text(doc: &ParsedDocument, min_chars: usize) -> Option<String> {
    let candidates = ElementMatch::tags(BODY_TAGS).class_matching(&BODY_CLASS);
    doc.find_all(&candidates)
        .iter()
        .map(ParsedDocument::text)
        .find(|text| text.chars().count() > min_chars)
}

/// First `<h1>` text, else the `og:title` meta content, else [`NO_TITLE`].
pub fn extract_title(doc: &ParsedDocument) -> String {
    let heading = doc
        .find_first(&ElementMatch::tags(&["h1"]))
        .map(|node| normalize_whitespace(&ParsedDocument::text(&node)))
        .filter(|text| !text.is_empty());
    if let Some(title) = heading {
        return title;
    }

    doc.find_first(&ElementMatch::tags(&["meta"]).attr_eq("property", "og:title"))
        .and_then(|node| ParsedDocument::attribute(&node, "content"))
        .map(normalize_whitespace)
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

/// Date portion of the published timestamp, else [`UNKNOWN_DATE`].
pub fn extract_publish_date(doc: &ParsedDocument) -> String {
    let published = doc
        .find_first(&ElementMatch::tags(&["meta"]).attr_eq("property", "article:published_time"))
        .and_then(|node| ParsedDocument::attribute(&node, "content"));
    let stamped = || {
        doc.find_first(&ElementMatch::tags(&["time"]).has_attr("datetime"))
            .and_then(|node| ParsedDocument::attribute(&node, "datetime"))
    };

    published
        .or_else(stamped)
        .and_then(|raw| raw.split('T').next())
        .map(str::trim)
        .filter(|date| !date.is_empty())
        .map_or_else(|| UNKNOWN_DATE.to_string(), str::to_string)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
