//! Fetch results and per-URL attempt records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::FetchErrorKind;
use crate::types::link::Link;

/// Fetch strategy that produced a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Single HTTP GET
    Static,
    /// Headless browser render
    Rendered,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Static => f.write_str("static"),
            Strategy::Rendered => f.write_str("rendered"),
        }
    }
}

/// Outcome of acquiring one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "kind")]
pub enum FetchStatus {
    Success,
    /// Fetched but below the richness threshold
    Empty,
    /// Disallowed by robots.txt
    Blocked,
    Error(FetchErrorKind),
    /// Run deadline elapsed before the fetch finished
    Cancelled,
}

impl FetchStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchStatus::Success)
    }
}

/// Markup signals that suggest a page needs a browser to render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSignals {
    /// Length of the raw HTML
    pub html_len: usize,

    /// Number of `<script>` elements
    pub script_count: usize,

    /// Number of `<a href>` elements
    pub link_count: usize,

    /// A `#root`/`#app` mount point with almost no text
    pub empty_app_shell: bool,

    /// Short page asking the visitor to enable JavaScript
    pub javascript_notice: bool,
}

impl PageSignals {
    /// True when the markup looks like an unrendered client-side app.
    pub fn looks_script_rendered(&self) -> bool {
        self.empty_app_shell
            || self.javascript_notice
            || (self.link_count < 5 && self.script_count > 10)
    }
}

/// Text and links extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    /// URL after redirects
    pub url: String,

    pub title: Option<String>,

    /// Visible text with markup, scripts and chrome removed
    pub text: String,

    /// Same-site outbound links
    #[serde(default)]
    pub links: Vec<Link>,

    #[serde(default)]
    pub signals: PageSignals,
}

impl PageContent {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            text: text.into(),
            links: Vec::new(),
            signals: PageSignals::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    pub fn with_signals(mut self, signals: PageSignals) -> Self {
        self.signals = signals;
        self
    }

    /// Number of characters of visible text.
    pub fn text_chars(&self) -> usize {
        self.text.chars().count()
    }

    /// Content richness heuristic.
    ///
    /// Sufficient pages carry at least `min_chars` characters of text and do
    /// not look like an unrendered script shell.
    pub fn is_sufficient(&self, min_chars: usize) -> bool {
        self.text_chars() >= min_chars && !self.signals.looks_script_rendered()
    }

    /// SHA-256 of the visible text.
    pub fn content_hash(&self) -> String {
        hash_content(&self.text)
    }
}

/// Compute the SHA-256 hash of content, hex-encoded.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A page returned by one fetch strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub content: PageContent,
    pub strategy: Strategy,
}

/// Record of acquiring one URL within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchAttempt {
    pub url: String,

    /// Last strategy used, or the cached entry's strategy on a cache hit
    pub strategy: Strategy,

    pub status: FetchStatus,

    /// Hash of the acquired text, when any text was acquired
    pub content_hash: Option<String>,

    pub fetched_at: DateTime<Utc>,

    /// Served from the cache without network access
    #[serde(default)]
    pub from_cache: bool,
}

impl FetchAttempt {
    pub fn new(url: impl Into<String>, strategy: Strategy, status: FetchStatus) -> Self {
        Self {
            url: url.into(),
            strategy,
            status,
            content_hash: None,
            fetched_at: Utc::now(),
            from_cache: false,
        }
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = at;
        self
    }

    pub fn from_cache(mut self) -> Self {
        self.from_cache = true;
        self
    }
}
