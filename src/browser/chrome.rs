//! Headless Chromium over the DevTools protocol.
//!
//! Each session launches its own headless browser with the run's user agent
//! and window size baked into the command line; the CDP event handler runs on
//! a background task until the session is closed.

use chromiumoxide::cdp::browser_protocol::emulation::SetScriptExecutionDisabledParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::browser::BrowserConfigBuilder;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use super::{
    BrowserError, BrowserLauncher, BrowserPage, BrowserSession, PageQuery, SessionSettings,
    WaitPolicy,
};
use crate::config::CrawlConfig;

/// Interval between DOM polls while waiting for a selector or ready state.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const VISIBLE_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// Launches headless Chromium sessions.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    args: Vec<String>,
    launch_timeout: Duration,
    request_timeout: Duration,
}

impl ChromeLauncher {
    /// Build a launcher from the run configuration.
    ///
    /// Every CDP command, `Page.navigate` included, is bounded by the
    /// navigation timeout.
    pub fn from_config(config: &CrawlConfig) -> Self {
        Self {
            args: vec!["--disable-gpu".to_string(), "--no-sandbox".to_string()],
            launch_timeout: config.launch_timeout(),
            request_timeout: config.navigation_timeout(),
        }
    }

    /// Browser configuration for one session.
    ///
    /// # Arguments
    ///
    /// * `settings` - Identity and viewport shared by every page of the run
    ///
    /// # Returns
    ///
    /// A builder with the launch arguments, user agent, window size, emulated
    /// viewport and timeouts applied.
    fn builder(&self, settings: &SessionSettings) -> BrowserConfigBuilder {
        BrowserConfig::builder()
            .args(self.args.clone())
            .arg(format!("--user-agent={}", settings.user_agent))
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(Viewport {
                width: settings.viewport_width,
                height: settings.viewport_height,
                ..Default::default()
            })
            .launch_timeout(self.launch_timeout)
            .request_timeout(self.request_timeout)
    }
}

impl BrowserLauncher for ChromeLauncher {
    type Session = ChromeSession;

    #[instrument(level = "info", skip_all)]
    async fn new_session(&self, settings: &SessionSettings) -> Result<ChromeSession, BrowserError> {
        let config = self.builder(settings).build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = timeout(self.launch_timeout, Browser::launch(config))
            .await
            .map_err(|_| BrowserError::Timeout {
                stage: "browser launch",
                after: self.launch_timeout,
            })?
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler error");
                }
            }
        });

        info!(
            width = settings.viewport_width,
            height = settings.viewport_height,
            "Launched headless browser"
        );
        Ok(ChromeSession {
            browser,
            handler,
            javascript_enabled: settings.javascript_enabled,
        })
    }
}

/// A running browser process and its CDP handler task.
pub struct ChromeSession {
    browser: Browser,
    handler: JoinHandle<()>,
    javascript_enabled: bool,
}

impl BrowserSession for ChromeSession {
    type Page = ChromePage;

    async fn new_page(&self) -> Result<ChromePage, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(BrowserError::protocol)?;
        if !self.javascript_enabled {
            page.execute(SetScriptExecutionDisabledParams::new(true))
                .await
                .map_err(BrowserError::protocol)?;
        }
        Ok(ChromePage { page })
    }

    async fn close(mut self) -> Result<(), BrowserError> {
        let closed = self.browser.close().await.map(|_| ()).map_err(BrowserError::protocol);
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler.abort();
        closed
    }
}

/// One Chromium tab.
pub struct ChromePage {
    page: Page,
}

impl ChromePage {
    async fn ready_state(&self) -> Result<String, BrowserError> {
        self.page
            .evaluate("document.readyState")
            .await
            .map_err(BrowserError::protocol)?
            .into_value::<String>()
            .map_err(BrowserError::protocol)
    }

    async fn navigate_until_parsed(&self, url: &str) -> Result<(), BrowserError> {
        let response = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if let Some(reason) = response.result.error_text.clone() {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason,
            });
        }
        while self.ready_state().await? == "loading" {
            sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }
}

impl BrowserPage for ChromePage {
    async fn add_init_script(&self, script: &str) -> Result<(), BrowserError> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
            .await
            .map_err(BrowserError::protocol)?;
        Ok(())
    }

    async fn set_identity(&self, user_agent: &str) -> Result<(), BrowserError> {
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent))
            .await
            .map_err(BrowserError::protocol)?;
        Ok(())
    }

    async fn navigate(&self, url: &str, limit: Duration, wait: WaitPolicy) -> Result<(), BrowserError> {
        let navigation = async {
            match wait {
                WaitPolicy::DomContentLoaded => self.navigate_until_parsed(url).await,
                WaitPolicy::Load => self
                    .page
                    .goto(url)
                    .await
                    .map(|_| ())
                    .map_err(|e| BrowserError::Navigation {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }),
            }
        };
        timeout(limit, navigation)
            .await
            .map_err(|_| BrowserError::Timeout {
                stage: "navigation",
                after: limit,
            })?
    }

    async fn query(&self, query: PageQuery<'_>) -> Result<bool, BrowserError> {
        match query {
            PageQuery::Selector(selector) => Ok(self.page.find_element(selector).await.is_ok()),
            PageQuery::Text(pattern) => {
                let text = self
                    .page
                    .evaluate(VISIBLE_TEXT_JS)
                    .await
                    .map_err(BrowserError::protocol)?
                    .into_value::<String>()
                    .map_err(BrowserError::protocol)?;
                Ok(pattern.is_match(&text))
            }
        }
    }

    async fn wait_for(&self, selector: &str, limit: Duration) -> Result<(), BrowserError> {
        let poll = async {
            while self.page.find_element(selector).await.is_err() {
                sleep(POLL_INTERVAL).await;
            }
        };
        timeout(limit, poll)
            .await
            .map_err(|_| BrowserError::SelectorMissing(selector.to_string()))
    }

    async fn read_html(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(BrowserError::protocol)
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.page.close().await.map_err(BrowserError::protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_applies_viewport_and_timeouts() {
        let config = CrawlConfig::default();
        let launcher = ChromeLauncher::from_config(&config);
        let settings = SessionSettings::from_config(&config, "test-agent");

        let built = launcher
            .builder(&settings)
            .chrome_executable("/bin/true")
            .build()
            .unwrap();
        let rendered = format!("{built:?}");

        assert!(rendered.contains("width: 1920"));
        assert!(rendered.contains("height: 1080"));
        assert!(rendered.contains("launch_timeout: 60s"));
        assert!(rendered.contains("request_timeout: 45s"));
        assert!(rendered.contains("--user-agent=test-agent"));
        assert!(rendered.contains("--no-sandbox"));
    }
}
