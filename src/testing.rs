//! In-memory fakes for the HTTP, browser and blocked-log capabilities.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::browser::{
    BrowserError, BrowserLauncher, BrowserPage, BrowserSession, PageQuery, SessionSettings,
    WaitPolicy,
};
use crate::config::CrawlConfig;
use crate::outputs::BlockedSink;
use crate::sitemap::{HttpFetch, SitemapError};

/// Config with no jitter and a one-second backoff base.
pub fn fast_config() -> CrawlConfig {
    CrawlConfig {
        jitter_min_ms: 0,
        jitter_max_ms: 0,
        backoff_base_ms: 1_000,
        ..CrawlConfig::default()
    }
}

/// Article page with `text` followed by enough filler to pass the body threshold.
pub fn article_html(text: &str) -> String {
    let filler = "Lorem ipsum dolor sit amet consectetur. ".repeat(20);
    format!(
        r#"<html><head>
<meta property="article:published_time" content="2025-03-01T10:00:00Z">
</head><body>
<h1>Headline</h1>
<div class="article-body">
<p>{text}</p>
<p>{filler}</p>
</div>
</body></html>"#
    )
}

/// Serves canned bodies by URL; unknown URLs fail with a timeout.
#[derive(Default)]
pub struct FakeHttp {
    bodies: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpFetch for FakeHttp {
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, SitemapError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .cloned()
            .ok_or(SitemapError::Timeout(timeout))
    }
}

#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

impl BlockedSink for MemorySink {
    async fn append(&self, url: &str) -> std::io::Result<()> {
        self.entries.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// How a fake page responds to a URL.
#[derive(Debug, Clone)]
pub enum PageBehavior {
    Serve(String),
    /// Renders an access-denied interstitial.
    Block,
    /// Every navigation fails.
    FailAlways,
    /// The first `n` navigations fail, then the markup is served.
    FailTimes(usize, String),
    /// Navigation takes the given time, then the markup is served.
    Slow(Duration, String),
    /// The content container is already in the DOM when navigation ends.
    Ready(String),
    /// The content container never appears.
    NeverRenders,
}

/// Page lifecycle events in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Navigated(String),
    Closed(Option<String>),
}

#[derive(Default)]
struct BrowserState {
    behaviors: HashMap<String, PageBehavior>,
    fail_launch: bool,
    new_page_failures: Mutex<usize>,
    navigations: Mutex<HashMap<String, Vec<Instant>>>,
    events: Mutex<Vec<PageEvent>>,
    calls: Mutex<Vec<String>>,
    open_pages: Mutex<usize>,
    max_open_pages: Mutex<usize>,
    pages_closed: Mutex<usize>,
    sessions: Mutex<Vec<SessionSettings>>,
    sessions_closed: Mutex<usize>,
}

/// Scriptable browser that records everything done to it.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    state: Arc<BrowserState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut BrowserState {
        Arc::get_mut(&mut self.state).expect("configure FakeBrowser before sharing it")
    }

    pub fn with_page(mut self, url: &str, behavior: PageBehavior) -> Self {
        self.state_mut().behaviors.insert(url.to_string(), behavior);
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.state_mut().fail_launch = true;
        self
    }

    /// Fail the next `n` page creations.
    pub fn failing_new_page(mut self, n: usize) -> Self {
        *self.state_mut().new_page_failures.get_mut().unwrap() = n;
        self
    }

    pub fn navigations(&self, url: &str) -> usize {
        self.navigation_times(url).len()
    }

    pub fn navigation_times(&self, url: &str) -> Vec<Instant> {
        self.state.navigations.lock().unwrap().get(url).cloned().unwrap_or_default()
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn open_pages(&self) -> usize {
        *self.state.open_pages.lock().unwrap()
    }

    pub fn max_open_pages(&self) -> usize {
        *self.state.max_open_pages.lock().unwrap()
    }

    pub fn pages_closed(&self) -> usize {
        *self.state.pages_closed.lock().unwrap()
    }

    pub fn sessions(&self) -> Vec<SessionSettings> {
        self.state.sessions.lock().unwrap().clone()
    }

    pub fn sessions_closed(&self) -> usize {
        *self.state.sessions_closed.lock().unwrap()
    }
}

impl BrowserLauncher for FakeBrowser {
    type Session = FakeSession;

    async fn new_session(&self, settings: &SessionSettings) -> Result<FakeSession, BrowserError> {
        if self.state.fail_launch {
            return Err(BrowserError::Launch("no browser binary".to_string()));
        }
        self.state.sessions.lock().unwrap().push(settings.clone());
        Ok(FakeSession {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeSession {
    state: Arc<BrowserState>,
}

impl BrowserSession for FakeSession {
    type Page = FakePage;

    async fn new_page(&self) -> Result<FakePage, BrowserError> {
        {
            let mut failures = self.state.new_page_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(BrowserError::Protocol("target crashed".to_string()));
            }
        }
        let mut open = self.state.open_pages.lock().unwrap();
        *open += 1;
        let mut max = self.state.max_open_pages.lock().unwrap();
        *max = (*max).max(*open);
        Ok(FakePage {
            state: Arc::clone(&self.state),
            url: Mutex::new(None),
        })
    }

    async fn close(self) -> Result<(), BrowserError> {
        *self.state.sessions_closed.lock().unwrap() += 1;
        Ok(())
    }
}

pub struct FakePage {
    state: Arc<BrowserState>,
    url: Mutex<Option<String>>,
}

impl FakePage {
    fn behavior(&self) -> PageBehavior {
        let url = self.url.lock().unwrap().clone().unwrap_or_default();
        self.state
            .behaviors
            .get(&url)
            .cloned()
            .unwrap_or(PageBehavior::FailAlways)
    }

    fn record_call(&self, call: String) {
        self.state.calls.lock().unwrap().push(call);
    }
}

impl BrowserPage for FakePage {
    async fn add_init_script(&self, _script: &str) -> Result<(), BrowserError> {
        self.record_call("init_script".to_string());
        Ok(())
    }

    async fn set_identity(&self, user_agent: &str) -> Result<(), BrowserError> {
        self.record_call(format!("identity:{user_agent}"));
        Ok(())
    }

    async fn navigate(&self, url: &str, _timeout: Duration, _wait: WaitPolicy) -> Result<(), BrowserError> {
        self.record_call(format!("navigate:{url}"));
        *self.url.lock().unwrap() = Some(url.to_string());
        let attempt = {
            let mut navigations = self.state.navigations.lock().unwrap();
            let times = navigations.entry(url.to_string()).or_default();
            times.push(Instant::now());
            times.len()
        };
        self.state.events.lock().unwrap().push(PageEvent::Navigated(url.to_string()));

        let failure = || BrowserError::Navigation {
            url: url.to_string(),
            reason: "net::ERR_CONNECTION_RESET".to_string(),
        };
        match self.behavior() {
            PageBehavior::FailAlways => Err(failure()),
            PageBehavior::FailTimes(n, _) if attempt <= n => Err(failure()),
            PageBehavior::Slow(delay, _) => {
                sleep(delay).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn query(&self, query: PageQuery<'_>) -> Result<bool, BrowserError> {
        match query {
            PageQuery::Selector(_) => Ok(matches!(self.behavior(), PageBehavior::Ready(_))),
            PageQuery::Text(pattern) => {
                let text = match self.behavior() {
                    PageBehavior::Block => "Access Denied",
                    _ => "Headline",
                };
                Ok(pattern.is_match(text))
            }
        }
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.record_call(format!("wait_for:{selector}"));
        match self.behavior() {
            PageBehavior::NeverRenders => Err(BrowserError::SelectorMissing(selector.to_string())),
            _ => Ok(()),
        }
    }

    async fn read_html(&self) -> Result<String, BrowserError> {
        match self.behavior() {
            PageBehavior::Serve(html)
            | PageBehavior::FailTimes(_, html)
            | PageBehavior::Slow(_, html)
            | PageBehavior::Ready(html) => Ok(html),
            PageBehavior::Block => Ok("<html><body>Access Denied</body></html>".to_string()),
            PageBehavior::FailAlways | PageBehavior::NeverRenders => {
                Err(BrowserError::Protocol("no document".to_string()))
            }
        }
    }

    async fn close(self) -> Result<(), BrowserError> {
        let url = self.url.lock().unwrap().clone();
        self.state.events.lock().unwrap().push(PageEvent::Closed(url));
        *self.state.open_pages.lock().unwrap() -= 1;
        *self.state.pages_closed.lock().unwrap() += 1;
        Ok(())
    }
}
