//! Fetch strategies.
//!
//! Every strategy implements [`Fetcher`] and returns the same
//! [`FetchedPage`] shape: visible text, title and same-site links.
//!
//! - [`StaticFetcher`] - one HTTP GET, no JavaScript
//! - [`ChromeFetcher`] - local headless Chromium
//! - [`FirecrawlFetcher`] - Firecrawl scrape API

mod chrome;
mod firecrawl;
mod static_http;

use async_trait::async_trait;

use crate::error::FetchResult;
use crate::types::fetch::{FetchedPage, Strategy};

pub use chrome::ChromeFetcher;
pub use firecrawl::FirecrawlFetcher;
pub use static_http::StaticFetcher;

/// One way of turning a URL into page content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch and extract a page.
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage>;

    /// Strategy reported for pages from this fetcher.
    fn strategy(&self) -> Strategy;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
