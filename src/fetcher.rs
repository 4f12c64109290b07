//! Single-URL fetch with block detection and exponential backoff.
//!
//! Each attempt opens its own page, disguises it, navigates, checks for an
//! anti-bot interstitial, waits for the article container and hands the
//! rendered markup to the [`ContentExtractor`]. The page is closed on every
//! exit path before the next attempt or the return.
//!
//! # Outcomes
//!
//! | Attempt result | Retried | Logged to blocked sink |
//! |----------------|---------|------------------------|
//! | [`FetchOutcome::Success`] | no | no |
//! | [`FetchOutcome::Blocked`] | no | yes |
//! | [`FetchOutcome::TransientFailure`] | up to `max_retries` times | once retries are exhausted |
//!
//! # Retry Strategy
//!
//! ```text
//! delay = backoff_base * 2^(attempt-1)
//! ```

use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::browser::stealth::{BLOCK_PATTERN, STEALTH_SCRIPT, random_user_agent};
use crate::browser::{BrowserError, BrowserPage, BrowserSession, PageQuery};
use crate::config::CrawlConfig;
use crate::models::ExtractionRecord;
use crate::outputs::BlockedSink;
use crate::scrapers::ContentExtractor;
use crate::utils::{backoff_delay, jitter_delay, truncate_for_log};

/// Result of one attempt at one URL.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Content was read and extracted (possibly into zero records).
    Success(Vec<ExtractionRecord>),
    /// The page is an anti-bot interstitial; retrying would hit it again.
    Blocked,
    /// Anything else went wrong; worth another attempt.
    TransientFailure(BrowserError),
}

/// Why a URL was written to the blocked sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abandoned {
    BlockDetected,
    RetriesExhausted,
}

/// Drives the fetch state machine for one URL at a time.
///
/// Holds only shared references, so one fetcher serves every concurrent
/// task in a batch.
pub struct PageFetcher<'a, S> {
    config: &'a CrawlConfig,
    extractor: &'a ContentExtractor,
    sink: &'a S,
}

impl<'a, S: BlockedSink> PageFetcher<'a, S> {
    pub fn new(config: &'a CrawlConfig, extractor: &'a ContentExtractor, sink: &'a S) -> Self {
        Self {
            config,
            extractor,
            sink,
        }
    }

    /// Fetch `url` and extract its records.
    ///
    /// Never fails: blocks and exhausted retries are written to the blocked
    /// sink and yield an empty list.
    #[instrument(level = "info", skip(self, session))]
    pub async fn fetch<B: BrowserSession>(&self, session: &B, url: &str) -> Vec<ExtractionRecord> {
        let total_t0 = Instant::now();
        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0u32;

        loop {
            let attempt_t0 = Instant::now();
            match self.attempt(session, url).await {
                FetchOutcome::Success(records) => {
                    debug!(
                        attempt = attempt + 1,
                        records = records.len(),
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "Fetched article"
                    );
                    return records;
                }
                FetchOutcome::Blocked => {
                    warn!(%url, "Blocked detected");
                    self.abandon(url, Abandoned::BlockDetected).await;
                    return Vec::new();
                }
                FetchOutcome::TransientFailure(e) => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max = max_attempts,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        error = %truncate_for_log(&e.to_string(), 200),
                        "Attempt failed"
                    );

                    if attempt >= max_attempts {
                        error!(
                            %url,
                            attempts = attempt,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            "Final failure"
                        );
                        self.abandon(url, Abandoned::RetriesExhausted).await;
                        return Vec::new();
                    }

                    let delay = backoff_delay(self.config.backoff_base(), attempt - 1);
                    debug!(attempt, ?delay, "Backing off");
                    sleep(delay).await;
                }
            }
        }
    }

    /// One pass through the state machine on a fresh page.
    async fn attempt<B: BrowserSession>(&self, session: &B, url: &str) -> FetchOutcome {
        let page = match session.new_page().await {
            Ok(page) => page,
            Err(e) => return FetchOutcome::TransientFailure(e),
        };

        let outcome = self
            .drive(&page, url)
            .await
            .unwrap_or_else(FetchOutcome::TransientFailure);

        if let Err(e) = page.close().await {
            warn!(%url, error = %e, "Failed to close page");
        }
        outcome
    }

    async fn drive<P: BrowserPage>(&self, page: &P, url: &str) -> Result<FetchOutcome, BrowserError> {
        page.add_init_script(STEALTH_SCRIPT).await?;
        if let Some(user_agent) = random_user_agent(&self.config.user_agents) {
            page.set_identity(user_agent).await?;
        }
        sleep(jitter_delay(self.config.jitter_min_ms, self.config.jitter_max_ms)).await;

        page.navigate(url, self.config.navigation_timeout(), self.config.navigation_wait)
            .await?;

        if page.query(PageQuery::Text(&*BLOCK_PATTERN)).await? {
            return Ok(FetchOutcome::Blocked);
        }

        let selector = self.config.content_selector.as_str();
        if !page.query(PageQuery::Selector(selector)).await? {
            page.wait_for(selector, self.config.content_wait_timeout()).await?;
        }
        let html = page.read_html().await?;
        Ok(FetchOutcome::Success(self.extractor.extract(&html, url)))
    }

    async fn abandon(&self, url: &str, reason: Abandoned) {
        match self.sink.append(url).await {
            Ok(()) => info!(%url, ?reason, "Recorded unprocessed URL"),
            Err(e) => error!(%url, ?reason, error = %e, "Failed to record unprocessed URL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBrowser, MemorySink, PageBehavior, article_html, fast_config};
    use crate::browser::BrowserLauncher;
    use crate::browser::SessionSettings;
    use std::time::Duration;

    const URL: &str = "https://x.test/news/1";

    async fn fetch_one(browser: &FakeBrowser, config: &CrawlConfig, sink: &MemorySink) -> Vec<ExtractionRecord> {
        let extractor = ContentExtractor::from_config(config).unwrap();
        let fetcher = PageFetcher::new(config, &extractor, sink);
        let session = browser
            .new_session(&SessionSettings::from_config(config, "ua"))
            .await
            .unwrap();
        let records = fetcher.fetch(&session, URL).await;
        session.close().await.unwrap();
        records
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_records() {
        let browser = FakeBrowser::new().with_page(URL, PageBehavior::Serve(article_html("people people people")));
        let config = fast_config();
        let sink = MemorySink::new();

        let records = fetch_one(&browser, &config, &sink).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].phrase, "people");
        assert_eq!(records[0].mentions, 3);
        assert!(sink.entries().is_empty());
        assert_eq!(browser.navigations(URL), 1);
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_exhaust_retries_with_growing_backoff() {
        let browser = FakeBrowser::new().with_page(URL, PageBehavior::FailAlways);
        let config = CrawlConfig { max_retries: 2, ..fast_config() };
        let sink = MemorySink::new();

        let records = fetch_one(&browser, &config, &sink).await;

        assert!(records.is_empty());
        assert_eq!(browser.navigations(URL), 3);
        assert_eq!(sink.entries(), vec![URL.to_string()]);

        let times = browser.navigation_times(URL);
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(config.backoff_base_ms));
        assert!(second_gap > first_gap);
        assert_eq!(browser.pages_closed(), 3);
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let browser =
            FakeBrowser::new().with_page(URL, PageBehavior::FailTimes(1, article_html("the people")));
        let config = fast_config();
        let sink = MemorySink::new();

        let records = fetch_one(&browser, &config, &sink).await;

        assert_eq!(records.len(), 2);
        assert_eq!(browser.navigations(URL), 2);
        assert!(sink.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_short_circuits_without_retry() {
        let browser = FakeBrowser::new().with_page(URL, PageBehavior::Block);
        let config = CrawlConfig { max_retries: 5, ..fast_config() };
        let sink = MemorySink::new();

        let records = fetch_one(&browser, &config, &sink).await;

        assert!(records.is_empty());
        assert_eq!(browser.navigations(URL), 1);
        assert_eq!(sink.entries(), vec![URL.to_string()]);
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_disguised_before_navigation() {
        let browser = FakeBrowser::new().with_page(URL, PageBehavior::Serve(article_html("people")));
        let config = fast_config();
        let sink = MemorySink::new();

        fetch_one(&browser, &config, &sink).await;

        let calls = browser.calls();
        let init = calls.iter().position(|c| c == "init_script").unwrap();
        let identity = calls.iter().position(|c| c.starts_with("identity:")).unwrap();
        let navigate = calls.iter().position(|c| c.starts_with("navigate:")).unwrap();
        assert!(init < navigate && identity < navigate);
        let agent = calls[identity].trim_start_matches("identity:");
        assert!(config.user_agents.iter().any(|ua| ua == agent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_open_failure_is_retried() {
        let browser = FakeBrowser::new()
            .with_page(URL, PageBehavior::Serve(article_html("people")))
            .failing_new_page(1);
        let config = fast_config();
        let sink = MemorySink::new();

        let records = fetch_one(&browser, &config, &sink).await;

        assert_eq!(records.len(), 1);
        assert_eq!(browser.navigations(URL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_content_selector_is_retried_then_logged() {
        let browser = FakeBrowser::new().with_page(URL, PageBehavior::NeverRenders);
        let config = CrawlConfig { max_retries: 2, ..fast_config() };
        let sink = MemorySink::new();

        let records = fetch_one(&browser, &config, &sink).await;

        assert!(records.is_empty());
        assert_eq!(browser.navigations(URL), 3);
        let waits = browser.calls().iter().filter(|c| c.starts_with("wait_for:")).count();
        assert_eq!(waits, 3);
        assert_eq!(sink.entries(), vec![URL.to_string()]);
        assert_eq!(browser.pages_closed(), 3);
        assert_eq!(browser.open_pages(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rendered_content_skips_selector_wait() {
        let browser = FakeBrowser::new().with_page(URL, PageBehavior::Ready(article_html("people")));
        let config = fast_config();
        let sink = MemorySink::new();

        let records = fetch_one(&browser, &config, &sink).await;

        assert_eq!(records.len(), 1);
        assert!(browser.calls().iter().all(|c| !c.starts_with("wait_for:")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_content_waits_for_selector() {
        let browser = FakeBrowser::new().with_page(URL, PageBehavior::Serve(article_html("people")));
        let config = fast_config();
        let sink = MemorySink::new();

        fetch_one(&browser, &config, &sink).await;

        let expected = format!("wait_for:{}", config.content_selector);
        assert!(browser.calls().contains(&expected));
    }
}
