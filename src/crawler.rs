//! Batched crawl orchestration.
//!
//! Article URLs are split into consecutive batches of `max_concurrent_tasks`.
//! Every URL in a batch is fetched concurrently, and the next batch starts
//! only once the whole current batch has finished, so at most one batch worth
//! of pages is ever open.
//!
//! One browsing session, with a user agent picked once for the run, serves
//! every batch and is closed when the crawl ends, including when it ends
//! early.

use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::browser::stealth::random_user_agent;
use crate::browser::{BrowserError, BrowserLauncher, BrowserSession, SessionSettings};
use crate::config::CrawlConfig;
use crate::fetcher::PageFetcher;
use crate::models::ExtractionRecord;
use crate::outputs::BlockedSink;
use crate::scrapers::ContentExtractor;

/// What a crawl produced.
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Records from every URL, batch by batch, in completion order within a batch.
    pub records: Vec<ExtractionRecord>,
    /// URLs dispatched.
    pub urls: usize,
    /// Batches run.
    pub batches: usize,
}

/// Runs the batch loop over a shared browser session.
pub struct Crawler<'a, S> {
    config: &'a CrawlConfig,
    fetcher: PageFetcher<'a, S>,
    phrases: usize,
}

impl<'a, S: BlockedSink> Crawler<'a, S> {
    pub fn new(config: &'a CrawlConfig, extractor: &'a ContentExtractor, sink: &'a S) -> Self {
        Self {
            config,
            fetcher: PageFetcher::new(config, extractor, sink),
            phrases: extractor.phrase_count(),
        }
    }

    /// Crawl `urls` in batches and gather every extraction record.
    ///
    /// # Errors
    ///
    /// Fails only when the browsing session cannot be opened. Per-URL
    /// failures are absorbed by the fetcher.
    #[instrument(level = "info", skip_all, fields(urls = urls.len()))]
    pub async fn run<L: BrowserLauncher>(
        &self,
        launcher: &L,
        urls: &[String],
    ) -> Result<CrawlReport, BrowserError> {
        let user_agent = random_user_agent(&self.config.user_agents).unwrap_or_default();
        let settings = SessionSettings::from_config(self.config, user_agent);
        let session = launcher.new_session(&settings).await?;

        let report = self.run_batches(&session, urls).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close browser session");
        }
        Ok(report)
    }

    async fn run_batches<B: BrowserSession>(&self, session: &B, urls: &[String]) -> CrawlReport {
        let batch_size = self.config.max_concurrent_tasks.max(1);
        let possible = urls.len() * self.phrases;
        let mut report = CrawlReport {
            urls: urls.len(),
            ..Default::default()
        };

        for batch in urls.chunks(batch_size) {
            let results: Vec<Vec<ExtractionRecord>> = stream::iter(batch)
                .map(|url| self.fetcher.fetch(session, url))
                .buffer_unordered(batch.len())
                .collect()
                .await;

            report.records.extend(results.into_iter().flatten());
            report.batches += 1;
            info!(
                batch = report.batches,
                "Progress: {}/{possible} possible entries",
                report.records.len()
            );
        }

        report
    }
}
