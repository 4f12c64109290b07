//! Article content extraction.
//!
//! Turns rendered article markup into [`ExtractionRecord`](crate::models::ExtractionRecord)s.
//! Extraction is split in two layers:
//!
//! 1. [`document`]: a typed view over a parsed HTML tree with explicit
//!    tag/class/attribute predicates
//! 2. [`extractor`]: the title, body, publish-date and phrase-count rules
//!    built on top of that view
//!
//! # Extraction Rules
//!
//! | Field | Source | Fallback |
//! |-------|--------|----------|
//! | Title | first `<h1>` | `og:title` meta, then `"No Title"` |
//! | Body | first `article`/`div`/`section` with class matching `article\|content` and text longer than the threshold | no records |
//! | Date | `article:published_time` meta | `<time datetime>`, then `"Unknown"` |
//!
//! Extraction is a pure function of the markup, URL and configured phrases.

pub mod document;
pub mod extractor;

pub use extractor::ContentExtractor;
