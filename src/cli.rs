//! Command-line interface definitions.
//!
//! The CLI only points at a config file and overrides a handful of its
//! values; everything else lives in [`CrawlConfig`]. All arguments can be
//! provided via command-line flags or environment variables.

use crate::config::CrawlConfig;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the sitemap phrase crawler.
///
/// # Examples
///
/// ```sh
/// # Stock crawl with built-in defaults
/// sitemap_phrase_crawler
///
/// # Custom config, different database
/// sitemap_phrase_crawler -c crawl.yaml -d ./results.db
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database to write results into
    #[arg(short, long, env = "CRAWLER_DATABASE")]
    pub database: Option<PathBuf>,

    /// Sitemap index URL to start from
    #[arg(short, long, env = "CRAWLER_SITEMAP_URL")]
    pub sitemap_url: Option<String>,

    /// File that blocked and exhausted URLs are appended to
    #[arg(long, env = "CRAWLER_BLOCKED_LOG")]
    pub blocked_log: Option<PathBuf>,

    /// Pages fetched concurrently per batch
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Retries per URL after a transient failure
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl Cli {
    /// Overlay the flags that were given onto a loaded configuration.
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(ref path) = self.database {
            config.database_path = path.clone();
        }
        if let Some(ref url) = self.sitemap_url {
            config.sitemap_url = url.clone();
        }
        if let Some(ref path) = self.blocked_log {
            config.blocked_log_path = path.clone();
        }
        if let Some(n) = self.max_concurrent {
            config.max_concurrent_tasks = n;
        }
        if let Some(n) = self.max_retries {
            config.max_retries = n;
        }
    }
}
