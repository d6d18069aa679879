//! Static HTTP fetcher.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::Fetcher;
use crate::config::{AcquisitionConfig, DEFAULT_USER_AGENT};
use crate::error::{AcquisitionError, FetchError, FetchResult, Result};
use crate::html::extract_page;
use crate::types::fetch::{FetchedPage, Strategy};

/// Fetches a page with a single GET and parses the returned HTML.
///
/// Does not execute JavaScript; script-rendered pages come back thin and
/// are escalated by the orchestrator.
pub struct StaticFetcher {
    client: reqwest::Client,
    max_chars: usize,
}

impl StaticFetcher {
    /// Create a fetcher with the default user agent and a 30s timeout.
    pub fn new() -> Result<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Create a fetcher sending `user_agent`.
    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| AcquisitionError::Config(Box::new(e)))?;

        Ok(Self {
            client,
            max_chars: AcquisitionConfig::default().max_content_chars,
        })
    }

    /// Create a fetcher from run configuration.
    pub fn from_config(config: &AcquisitionConfig) -> Result<Self> {
        Ok(Self::with_user_agent(&config.user_agent)?.with_max_chars(config.max_content_chars))
    }

    /// Use a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Set the per-page text limit.
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// The underlying client, shared with the robots loader.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        Url::parse(url).map_err(|_| FetchError::InvalidUrl { url: url.to_string() })?;

        debug!(url = %url, "static fetch starting");
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "static fetch failed");
            FetchError::network(url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "static fetch non-2xx");
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Resolve links against the final URL after redirects
        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let content = extract_page(&html, &final_url, self.max_chars);
        debug!(
            url = %url,
            chars = content.text_chars(),
            links = content.links.len(),
            "static fetch complete"
        );

        Ok(FetchedPage {
            content,
            strategy: Strategy::Static,
        })
    }

    fn strategy(&self) -> Strategy {
        Strategy::Static
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
