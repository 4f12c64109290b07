//! Run configuration.
//!
//! A [`CrawlConfig`] is built once at startup (YAML file, then CLI overrides)
//! and passed by reference into every component. Every field has a default, so
//! an empty or missing config file yields the stock crawl of the Daily Star
//! news sitemap for 2025.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::browser::WaitPolicy;

const DEFAULT_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
];

/// Errors raised while loading or validating configuration. All are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a crawl run needs to know.
///
/// # Timeouts
///
/// Three independent bounds apply: `request_timeout_ms` for page navigation,
/// `content_wait_timeout_ms` for the content selector (must be shorter), and
/// `sitemap_timeout_ms` for each sitemap HTTP fetch.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Phrases to count in article bodies.
    pub phrases: Vec<String>,
    /// First year (inclusive) a child sitemap URL must mention.
    pub start_year: i32,
    /// Last year (inclusive) a child sitemap URL may mention.
    pub end_year: i32,
    /// URL of the top-level sitemap index.
    pub sitemap_url: String,
    /// Allowed first path segments; empty allows everything.
    pub tags: Vec<String>,
    /// Batch size, and therefore the number of pages open at once.
    pub max_concurrent_tasks: usize,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Navigation timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Navigation completes at this point; `dom_content_loaded` or `load`.
    pub navigation_wait: WaitPolicy,
    /// Content selector wait in milliseconds.
    pub content_wait_timeout_ms: u64,
    /// Per-sitemap HTTP timeout in milliseconds.
    pub sitemap_timeout_ms: u64,
    /// Bound on launching the browser, in milliseconds.
    pub launch_timeout_ms: u64,
    /// Pool of user-agent strings to rotate through.
    pub user_agents: Vec<String>,
    /// Lower bound of the pre-navigation jitter.
    pub jitter_min_ms: u64,
    /// Upper bound of the pre-navigation jitter.
    pub jitter_max_ms: u64,
    /// First retry delay; doubles on each further retry.
    pub backoff_base_ms: u64,
    /// A body candidate must be longer than this many characters.
    pub min_body_chars: usize,
    /// Selector that signals the article has rendered.
    pub content_selector: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Append-only log of blocked or exhausted URLs.
    pub blocked_log_path: PathBuf,
    /// Drop repeated article URLs before dispatch.
    pub dedupe_urls: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            phrases: vec!["the".to_string(), "people".to_string()],
            start_year: 2025,
            end_year: 2025,
            sitemap_url: "https://www.dailystar.co.uk/sitemaps/sitemap_index.xml".to_string(),
            tags: vec!["news".to_string()],
            max_concurrent_tasks: 5,
            max_retries: 2,
            request_timeout_ms: 45_000,
            navigation_wait: WaitPolicy::DomContentLoaded,
            content_wait_timeout_ms: 20_000,
            sitemap_timeout_ms: 45_000,
            launch_timeout_ms: 60_000,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            jitter_min_ms: 1_500,
            jitter_max_ms: 4_000,
            backoff_base_ms: 1_000,
            min_body_chars: 500,
            content_selector: "article, div.article-body, .post-content".to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            database_path: PathBuf::from("the_daily.db"),
            blocked_log_path: PathBuf::from("blocked_urls.txt"),
            dedupe_urls: true,
        }
    }
}

impl CrawlConfig {
    /// Load configuration from a YAML file, or defaults when `path` is `None`.
    ///
    /// Fields missing from the file keep their default values. The result is
    /// not validated; call [`CrawlConfig::validate`] after applying overrides.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration");
        debug!(?config, "Effective configuration");
        Ok(config)
    }

    /// Parse configuration from YAML text. An empty document yields defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Reject configurations the crawl cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.phrases.iter().all(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid("at least one phrase is required".into()));
        }
        if self.start_year > self.end_year {
            return Err(ConfigError::Invalid(format!(
                "start_year {} is after end_year {}",
                self.start_year, self.end_year
            )));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid("max_concurrent_tasks must be at least 1".into()));
        }
        if self.user_agents.is_empty() {
            return Err(ConfigError::Invalid("user_agents must not be empty".into()));
        }
        if self.jitter_min_ms > self.jitter_max_ms {
            return Err(ConfigError::Invalid(format!(
                "jitter_min_ms {} exceeds jitter_max_ms {}",
                self.jitter_min_ms, self.jitter_max_ms
            )));
        }
        if self.content_wait_timeout_ms >= self.request_timeout_ms {
            return Err(ConfigError::Invalid(
                "content_wait_timeout_ms must be shorter than request_timeout_ms".into(),
            ));
        }
        if self.content_selector.trim().is_empty() {
            return Err(ConfigError::Invalid("content_selector must not be empty".into()));
        }
        Ok(())
    }

    /// Configured phrases with blank entries dropped.
    pub fn active_phrases(&self) -> impl Iterator<Item = &str> {
        self.phrases.iter().map(String::as_str).filter(|p| !p.trim().is_empty())
    }

    /// Lower-cased tag allow-set.
    pub fn tag_set(&self) -> HashSet<String> {
        self.tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Bound on one page navigation.
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Bound on waiting for the content selector after navigation.
    pub fn content_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.content_wait_timeout_ms)
    }

    /// Bound on one sitemap HTTP fetch, body included.
    pub fn sitemap_timeout(&self) -> Duration {
        Duration::from_millis(self.sitemap_timeout_ms)
    }

    /// Bound on starting the browser process.
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    /// Delay before the first retry; each later retry doubles it.
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}
