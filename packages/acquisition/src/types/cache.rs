//! Cache entries keyed by company and URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::fetch::{hash_content, PageContent, Strategy};

/// Cache key: company namespace plus normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Company namespace (slug of the company name)
    pub company: String,
    pub url: String,
}

impl CacheKey {
    pub fn new(company: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            url: url.into(),
        }
    }
}

/// A previously fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub content: PageContent,
    pub strategy: Strategy,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,

    /// SHA-256 of the page text
    pub content_hash: String,
}

impl CacheEntry {
    pub fn new(key: CacheKey, content: PageContent, strategy: Strategy, ttl: Duration) -> Self {
        let content_hash = hash_content(&content.text);
        Self {
            key,
            content,
            strategy,
            fetched_at: Utc::now(),
            ttl,
            content_hash,
        }
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// Stale once strictly more than `ttl` has elapsed since the fetch.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.fetched_at);
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => age > ttl,
            // ttl beyond chrono's range never expires
            Err(_) => false,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl: Duration) -> CacheEntry {
        CacheEntry::new(
            CacheKey::new("acme", "https://acme.com/about"),
            PageContent::new("https://acme.com/about", "About Acme"),
            Strategy::Static,
            ttl,
        )
    }

    #[test]
    fn test_staleness_boundary() {
        let ttl = Duration::from_secs(3600);
        let now = Utc::now();
        let ttl_chrono = chrono::Duration::seconds(3600);
        let one = chrono::Duration::seconds(1);

        let expired = entry(ttl).with_fetched_at(now - ttl_chrono - one);
        assert!(expired.is_stale_at(now));

        let fresh = entry(ttl).with_fetched_at(now - ttl_chrono + one);
        assert!(!fresh.is_stale_at(now));

        let exact = entry(ttl).with_fetched_at(now - ttl_chrono);
        assert!(!exact.is_stale_at(now));
    }

    #[test]
    fn test_hash_matches_content() {
        let e = entry(Duration::from_secs(1));
        assert_eq!(e.content_hash, e.content.content_hash());
    }
}
