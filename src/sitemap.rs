//! Sitemap retrieval and parsing.
//!
//! Sites publish a two-level hierarchy: a sitemap index whose `<loc>` entries
//! point at child sitemaps, and child sitemaps whose `<loc>` entries are
//! article URLs. Both levels share the same document shape, so one resolver
//! handles both.
//!
//! Resolution never fails to the caller. A network error, timeout, or
//! malformed document is logged and turns into an empty list so the run can
//! continue with whatever other sitemaps succeeded.

use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::utils::truncate_for_log;

/// Namespace of the sitemaps.org protocol; `<loc>` outside it is ignored.
pub const SITEMAP_NAMESPACE: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("XML parse error: {0}")]
    Xml(String),
}

/// Plain HTTP GET, used only for sitemap documents.
pub trait HttpFetch {
    /// Fetch `url` and return the response body as text.
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, SitemapError>;
}

/// [`HttpFetch`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a client that identifies as `user_agent` and follows up to five redirects.
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::Http`] if the TLS backend cannot be initialised.
    pub fn new(user_agent: &str) -> Result<Self, SitemapError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, SitemapError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?
            .error_for_status()?;
        response.text().await.map_err(|e| classify(e, timeout))
    }
}

/// Timeouts anywhere in the exchange, body read included, become [`SitemapError::Timeout`].
fn classify(e: reqwest::Error, timeout: Duration) -> SitemapError {
    if e.is_timeout() {
        SitemapError::Timeout(timeout)
    } else {
        SitemapError::Http(e)
    }
}

/// Fetches sitemap documents and flattens them into URL lists.
#[derive(Debug)]
pub struct SitemapResolver<'a, H> {
    http: &'a H,
    timeout: Duration,
}

impl<'a, H: HttpFetch> SitemapResolver<'a, H> {
    pub fn new(http: &'a H, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// Resolve one sitemap document into the URLs its `<loc>` elements name.
    ///
    /// Returns an empty list on any failure.
    #[instrument(level = "info", skip(self))]
    pub async fn resolve(&self, url: &str) -> Vec<String> {
        let body = match self.http.get(url, self.timeout).await {
            Ok(body) => body,
            Err(e) => {
                error!(%url, error = %truncate_for_log(&e.to_string(), 200), "Sitemap error");
                return Vec::new();
            }
        };

        match parse_locations(&body) {
            Ok(urls) => {
                info!(%url, count = urls.len(), "Resolved sitemap");
                urls
            }
            Err(e) => {
                error!(%url, error = %e, "Sitemap error");
                Vec::new()
            }
        }
    }

    /// Resolve each child sitemap in turn and concatenate the results.
    ///
    /// Duplicates across sitemaps are kept; a failed child contributes nothing.
    #[instrument(level = "info", skip_all, fields(sitemaps = sitemaps.len()))]
    pub async fn resolve_all(&self, sitemaps: &[String]) -> Vec<String> {
        let mut urls = Vec::new();
        for sitemap in sitemaps {
            urls.extend(self.resolve(sitemap).await);
        }
        info!(count = urls.len(), "Resolved child sitemaps");
        urls
    }
}

/// Extract the text of every `<loc>` element bound to [`SITEMAP_NAMESPACE`].
///
/// A document that is not well-formed yields an error rather than a partial list.
pub fn parse_locations(xml: &str) -> Result<Vec<String>, SitemapError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locations = Vec::new();
    let mut depth_in_loc = 0usize;
    let mut current = String::new();

    loop {
        let (namespace, event) = reader
            .read_resolved_event()
            .map_err(|e| SitemapError::Xml(e.to_string()))?;
        let in_sitemap_ns =
            matches!(namespace, ResolveResult::Bound(Namespace(ns)) if ns == SITEMAP_NAMESPACE);

        match event {
            Event::Start(ref e) if in_sitemap_ns && depth_in_loc == 0 && e.local_name().as_ref() == b"loc" => {
                depth_in_loc = 1;
                current.clear();
            }
            Event::Start(_) if depth_in_loc > 0 => depth_in_loc += 1,
            Event::Text(ref e) if depth_in_loc > 0 => {
                let text = e.unescape().map_err(|err| SitemapError::Xml(err.to_string()))?;
                current.push_str(&text);
            }
            Event::CData(ref e) if depth_in_loc > 0 => {
                current.push_str(&String::from_utf8_lossy(e));
            }
            Event::End(_) if depth_in_loc > 0 => {
                depth_in_loc -= 1;
                if depth_in_loc == 0 {
                    let loc = current.trim();
                    if !loc.is_empty() {
                        locations.push(loc.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(locations)
}
