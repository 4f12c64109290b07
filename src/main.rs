//! # Sitemap Phrase Crawler
//!
//! Discovers a news site's articles through its sitemap hierarchy, renders
//! each article in headless Chromium, counts configured phrases in the
//! article body, and stores the counts in SQLite.
//!
//! ## Features
//!
//! - Walks a sitemap index and its child sitemaps, filtered by year and by
//!   article section
//! - Renders pages with stealth measures and rotating user agents
//! - Detects anti-bot interstitials and logs those URLs instead of retrying
//! - Retries transient failures with exponential backoff
//! - Writes `(url, phrase)`-keyed rows idempotently, so reruns never duplicate
//!
//! ## Usage
//!
//! ```sh
//! sitemap_phrase_crawler -c crawl.yaml -d ./the_daily.db
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Discovery**: Resolve the sitemap index, keep child sitemaps in the year range
//! 2. **Expansion**: Resolve child sitemaps into article URLs, keep allowed sections
//! 3. **Crawl**: Fetch articles in fixed-size concurrent batches
//! 4. **Output**: Upsert records into SQLite; blocked URLs go to a text log

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod crawler;
mod fetcher;
mod filter;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod sitemap;
#[cfg(test)]
mod testing;
mod utils;

use browser::chrome::ChromeLauncher;
use browser::stealth::random_user_agent;
use cli::Cli;
use config::CrawlConfig;
use outputs::{FileSink, SqliteStore};
use sitemap::ReqwestFetcher;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("sitemap_phrase_crawler starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.config, ?args.database, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = CrawlConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        error!(error = %e, "Configuration rejected");
        return Err(e.into());
    }

    // ---- Outputs ----
    let mut store = match SqliteStore::open(&config.database_path) {
        Ok(store) => store,
        Err(e) => {
            error!(
                path = %config.database_path.display(),
                error = %e,
                "Database is not usable (fix perms or choose a different path)"
            );
            return Err(e.into());
        }
    };
    let sink = FileSink::open(&config.blocked_log_path).await?;
    info!(path = %sink.path().display(), "Blocked URL log ready");

    // ---- Discovery ----
    let http = ReqwestFetcher::new(random_user_agent(&config.user_agents).unwrap_or_default())?;
    let urls = pipeline::discover(&config, &http).await;
    if urls.is_empty() {
        warn!(sitemap = %config.sitemap_url, "No article URLs discovered");
    }

    // ---- Crawl and store ----
    let launcher = ChromeLauncher::from_config(&config);
    let saved = pipeline::crawl_and_store(&config, &launcher, &sink, &mut store, &urls).await?;
    let total_rows = store.row_count()?;
    info!(saved, total_rows, "Processing complete! Saved {saved} articles");

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
