//! Firecrawl rendering fetcher.
//!
//! Uses the Firecrawl scrape API to render JavaScript-heavy pages. Raw HTML
//! is requested so extraction matches the other strategies.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use super::Fetcher;
use crate::config::AcquisitionConfig;
use crate::error::{AcquisitionError, FetchError, FetchResult, Result};
use crate::html::extract_page;
use crate::types::fetch::{FetchedPage, Strategy};

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Renders pages through the Firecrawl API.
pub struct FirecrawlFetcher {
    client: Client,
    api_key: SecretString,
    base_url: String,
    wait_for: Duration,
    max_chars: usize,
}

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: Vec<&'static str>,
    #[serde(rename = "waitFor")]
    wait_for: u64,
    timeout: u64,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    #[serde(rename = "rawHtml")]
    raw_html: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: Option<u16>,
}

impl FirecrawlFetcher {
    /// Create a fetcher with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AcquisitionError::Config(Box::new(e)))?;

        Ok(Self {
            client,
            api_key: SecretString::from(api_key.into()),
            base_url: FIRECRAWL_API_URL.to_string(),
            wait_for: Duration::from_secs(2),
            max_chars: AcquisitionConfig::default().max_content_chars,
        })
    }

    /// Create from environment variable `FIRECRAWL_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let api_key = std::env::var("FIRECRAWL_API_KEY")
            .map_err(|_| AcquisitionError::Config("FIRECRAWL_API_KEY not set".into()))?;
        Self::new(api_key)
    }

    /// Set a custom API base URL (for self-hosted instances and tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Time the renderer waits for the page to settle (default 2s).
    pub fn with_wait_for(mut self, wait_for: Duration) -> Self {
        self.wait_for = wait_for;
        self
    }

    /// Apply the text limit from run configuration.
    pub fn with_config(mut self, config: &AcquisitionConfig) -> Self {
        self.max_chars = config.max_content_chars;
        self
    }
}

#[async_trait]
impl Fetcher for FirecrawlFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl { url: url.to_string() })?;

        let request = ScrapeRequest {
            url,
            formats: vec!["rawHtml"],
            wait_for: self.wait_for.as_millis() as u64,
            timeout: 30_000,
        };

        info!(url = %url, fetcher = "firecrawl", "rendering page");
        let response = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = status.as_u16(), body = %body, "Firecrawl request failed");
            return Err(FetchError::render(url, format!("Firecrawl API returned {}", status)));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::render(url, format!("invalid Firecrawl response: {e}")))?;

        if !body.success {
            return Err(FetchError::render(
                url,
                body.error.unwrap_or_else(|| "scrape unsuccessful".to_string()),
            ));
        }

        let data = body
            .data
            .ok_or_else(|| FetchError::render(url, "no data in Firecrawl response"))?;

        let metadata = data.metadata;
        if let Some(code) = metadata.as_ref().and_then(|m| m.status_code) {
            if !(200..300).contains(&code) {
                return Err(FetchError::Http {
                    url: url.to_string(),
                    status: code,
                });
            }
        }

        let page_url = metadata
            .and_then(|m| m.source_url)
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or(parsed);

        let html = data.raw_html.unwrap_or_default();
        let content = extract_page(&html, &page_url, self.max_chars);

        Ok(FetchedPage {
            content,
            strategy: Strategy::Rendered,
        })
    }

    fn strategy(&self) -> Strategy {
        Strategy::Rendered
    }

    fn name(&self) -> &'static str {
        "firecrawl"
    }
}
