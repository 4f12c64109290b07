//! End-to-end run: sitemap discovery, filtering, crawl and persistence.
//!
//! ```text
//! sitemap index ──YearFilter──▶ child sitemaps ──resolve_all──▶ article URLs
//!      ──TagFilter──▶ (dedupe) ──Crawler──▶ records ──ResultStore──▶ SQLite
//! ```

use itertools::Itertools;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::browser::{BrowserError, BrowserLauncher};
use crate::config::CrawlConfig;
use crate::crawler::Crawler;
use crate::filter::{TagFilter, YearFilter};
use crate::outputs::{BlockedSink, ResultStore, StoreError};
use crate::scrapers::ContentExtractor;
use crate::sitemap::{HttpFetch, SitemapResolver};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid phrase pattern: {0}")]
    Phrase(#[from] regex::Error),
}

/// Walk the sitemap hierarchy and return the article URLs to crawl.
///
/// # Returns
///
/// Article URLs in sitemap order, restricted to child sitemaps within the
/// year range and articles under an allowed tag. Repeats are dropped when
/// `dedupe_urls` is set.
#[instrument(level = "info", skip_all, fields(index = %config.sitemap_url))]
pub async fn discover<H: HttpFetch>(config: &CrawlConfig, http: &H) -> Vec<String> {
    let resolver = SitemapResolver::new(http, config.sitemap_timeout());

    let children = resolver.resolve(&config.sitemap_url).await;
    let children = YearFilter::from_config(config).apply(children);
    info!(
        count = children.len(),
        start_year = config.start_year,
        end_year = config.end_year,
        "Child sitemaps in year range"
    );

    let articles = resolver.resolve_all(&children).await;
    let resolved = articles.len();
    let articles = TagFilter::from_config(config).apply(articles);
    let articles: Vec<String> = if config.dedupe_urls {
        articles.into_iter().unique().collect()
    } else {
        articles
    };

    info!(resolved, kept = articles.len(), "Article URLs ready for crawl");
    articles
}

/// Crawl `urls` and write every record to `store` in one transaction.
///
/// # Returns
///
/// The number of records written.
#[instrument(level = "info", skip_all, fields(urls = urls.len()))]
pub async fn crawl_and_store<L, S, R>(
    config: &CrawlConfig,
    launcher: &L,
    sink: &S,
    store: &mut R,
    urls: &[String],
) -> Result<usize, PipelineError>
where
    L: BrowserLauncher,
    S: BlockedSink,
    R: ResultStore,
{
    let extractor = ContentExtractor::from_config(config)?;
    info!(phrases = extractor.phrase_count(), "Extractor ready");

    let report = Crawler::new(config, &extractor, sink).run(launcher, urls).await?;

    let undated = report.records.iter().filter(|r| r.has_unknown_date()).count();
    if undated > 0 {
        warn!(undated, "Some records have no publish date");
    }

    let saved = store.upsert(&report.records)?;
    info!(saved, urls = report.urls, batches = report.batches, "Stored crawl results");
    Ok(saved)
}
