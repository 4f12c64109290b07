//! Rendering-capable page fetch abstraction.
//!
//! The crawl never talks to a browser directly; it drives three small traits
//! so the retry, block-detection and batching logic can be exercised against
//! fakes:
//!
//! - [`BrowserLauncher`]: opens a [`BrowserSession`] configured with the run's
//!   client identity and viewport
//! - [`BrowserSession`]: hands out fresh, exclusively-owned pages
//! - [`BrowserPage`]: navigate, query, wait, read markup, close
//!
//! [`chrome`] implements them over the Chrome DevTools Protocol.

pub mod chrome;
pub mod stealth;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::CrawlConfig;

/// Errors raised by a page-fetch capability.
///
/// Every variant is a transient failure from the crawl's point of view;
/// block detection is reported separately, not as an error.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("selector {0:?} never appeared")]
    SelectorMissing(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    pub fn protocol(e: impl std::fmt::Display) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// How far a navigation must progress before it counts as done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// The DOM has been parsed; subresources may still be loading.
    #[default]
    DomContentLoaded,
    /// The `load` event has fired.
    Load,
}

/// Something to look for on a rendered page.
#[derive(Debug, Clone, Copy)]
pub enum PageQuery<'a> {
    /// A CSS selector matching at least one element.
    Selector(&'a str),
    /// A pattern matching the page's visible text.
    Text(&'a Regex),
}

/// Browsing-context settings shared by every page of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub javascript_enabled: bool,
}

impl SessionSettings {
    pub fn from_config(config: &CrawlConfig, user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            javascript_enabled: true,
        }
    }
}

/// Creates browsing sessions.
pub trait BrowserLauncher {
    type Session: BrowserSession;

    async fn new_session(&self, settings: &SessionSettings) -> Result<Self::Session, BrowserError>;
}

/// A browsing context; pages opened from it share its settings.
pub trait BrowserSession {
    type Page: BrowserPage;

    /// Open a fresh blank page owned by the caller.
    async fn new_page(&self) -> Result<Self::Page, BrowserError>;

    /// Release the context and everything opened from it.
    async fn close(self) -> Result<(), BrowserError>;
}

/// One tab. Never shared between concurrent fetches.
pub trait BrowserPage {
    /// Install a script that runs before any page script on every navigation.
    async fn add_init_script(&self, script: &str) -> Result<(), BrowserError>;

    /// Override the user agent for this page only.
    async fn set_identity(&self, user_agent: &str) -> Result<(), BrowserError>;

    async fn navigate(&self, url: &str, timeout: Duration, wait: WaitPolicy) -> Result<(), BrowserError>;

    /// Whether `query` currently matches anything on the page.
    async fn query(&self, query: PageQuery<'_>) -> Result<bool, BrowserError>;

    /// Wait until `selector` matches, failing after `timeout`.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Full rendered markup.
    async fn read_html(&self) -> Result<String, BrowserError>;

    async fn close(self) -> Result<(), BrowserError>;
}
