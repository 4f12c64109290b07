//! Persistence for crawl results.
//!
//! # Submodules
//!
//! - [`store`]: idempotent SQLite store for extraction records
//! - [`blocked`]: append-only log of URLs that were blocked or ran out of retries
//!
//! # Output Structure
//!
//! ```text
//! the_daily.db
//! └── articles (url, title, phrase, mentions, date_published)   PK (url, phrase)
//!
//! blocked_urls.txt                                               one URL per line
//! ```

pub mod blocked;
pub mod store;

pub use blocked::{BlockedSink, FileSink};
pub use store::{ResultStore, SqliteStore, StoreError};
