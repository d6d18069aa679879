//! Fetch orchestration: cache, politeness, then static with one escalation.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::CacheStore;
use crate::config::AcquisitionConfig;
use crate::error::{FetchError, FetchErrorKind};
use crate::fetchers::Fetcher;
use crate::politeness::PolitenessPolicy;
use crate::types::cache::{CacheEntry, CacheKey};
use crate::types::fetch::{FetchAttempt, FetchStatus, PageContent, Strategy};
use crate::types::link::normalize_url;
use crate::types::site::Site;

/// Result of acquiring one URL.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub attempt: FetchAttempt,

    /// Page content for `Success`, and the thin page for `Empty` when one
    /// was fetched. `None` for `Blocked` and `Error`.
    pub page: Option<PageContent>,
}

impl Acquisition {
    fn new(attempt: FetchAttempt, page: Option<PageContent>) -> Self {
        Self { attempt, page }
    }

    pub fn status(&self) -> FetchStatus {
        self.attempt.status
    }
}

/// Drives one URL through cache lookup, politeness and the fetch strategies.
///
/// The static fetcher runs first. Thin or failed results escalate to the
/// renderer exactly once; nothing is retried beyond that.
pub struct FetchOrchestrator {
    static_fetcher: Arc<dyn Fetcher>,
    renderer: Option<Arc<dyn Fetcher>>,
    cache: Arc<dyn CacheStore>,
    policy: Arc<PolitenessPolicy>,
    cache_ttl: Duration,
    force_refresh: bool,
    min_content_chars: usize,
}

impl FetchOrchestrator {
    pub fn new(
        static_fetcher: Arc<dyn Fetcher>,
        cache: Arc<dyn CacheStore>,
        policy: Arc<PolitenessPolicy>,
        config: &AcquisitionConfig,
    ) -> Self {
        Self {
            static_fetcher,
            renderer: None,
            cache,
            policy,
            cache_ttl: config.cache_ttl,
            force_refresh: config.force_refresh,
            min_content_chars: config.min_content_chars,
        }
    }

    /// Escalate thin or failed static fetches to `renderer`.
    pub fn with_renderer(mut self, renderer: Arc<dyn Fetcher>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn policy(&self) -> &PolitenessPolicy {
        &self.policy
    }

    /// Acquire `url` for `site`.
    ///
    /// `url` is normalized first, so spelling variants of one page share a
    /// cache entry.
    pub async fn acquire(&self, site: &Site, url: &str) -> Acquisition {
        let normalized = normalize_url(url, None).unwrap_or_else(|| url.to_string());
        let url = normalized.as_str();
        let key = CacheKey::new(site.namespace(), url);

        if let Some(hit) = self.cached(&key).await {
            return hit;
        }

        if !self.policy.allowed(url).await {
            return Acquisition::new(
                FetchAttempt::new(url, Strategy::Static, FetchStatus::Blocked),
                None,
            );
        }

        let domain = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        // Static first
        let mut thin: Option<PageContent> = None;
        let mut last_error: Option<FetchErrorKind> = None;

        match self.fetch_with(self.static_fetcher.as_ref(), &domain, url).await {
            Ok(page) if page.is_sufficient(self.min_content_chars) => {
                return self.succeed(key, page, Strategy::Static).await;
            }
            Ok(page) => {
                debug!(url = %url, chars = page.text_chars(), "static result insufficient");
                thin = Some(page);
            }
            Err(e) => {
                debug!(url = %url, error = %e, "static fetch failed");
                last_error = Some(e.kind());
            }
        }

        let Some(renderer) = &self.renderer else {
            return self.unsuccessful(url, Strategy::Static, thin, last_error);
        };

        info!(url = %url, renderer = renderer.name(), "escalating to rendering fetch");
        match self.fetch_with(renderer.as_ref(), &domain, url).await {
            Ok(page) if page.is_sufficient(self.min_content_chars) => {
                self.succeed(key, page, Strategy::Rendered).await
            }
            Ok(page) => {
                let best = match thin {
                    Some(static_page) if static_page.text_chars() > page.text_chars() => static_page,
                    _ => page,
                };
                self.unsuccessful(url, Strategy::Rendered, Some(best), None)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "rendering fetch failed");
                self.unsuccessful(url, Strategy::Rendered, thin, Some(e.kind()))
            }
        }
    }

    async fn cached(&self, key: &CacheKey) -> Option<Acquisition> {
        if self.force_refresh {
            return None;
        }

        let entry = match self.cache.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!(url = %key.url, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };

        if self.cache.is_stale(&entry) {
            debug!(url = %key.url, fetched_at = %entry.fetched_at, "cache entry stale");
            return None;
        }

        debug!(url = %key.url, "cache hit");
        let attempt = FetchAttempt::new(&key.url, entry.strategy, FetchStatus::Success)
            .with_content_hash(entry.content_hash)
            .with_fetched_at(entry.fetched_at)
            .from_cache();
        Some(Acquisition::new(attempt, Some(entry.content)))
    }

    async fn fetch_with(
        &self,
        fetcher: &dyn Fetcher,
        domain: &str,
        url: &str,
    ) -> Result<PageContent, FetchError> {
        let _permit = self.policy.wait_token(domain).await;
        fetcher.fetch(url).await.map(|fetched| fetched.content)
    }

    async fn succeed(&self, key: CacheKey, page: PageContent, strategy: Strategy) -> Acquisition {
        let entry = CacheEntry::new(key, page, strategy, self.cache_ttl);

        // A failed write must not discard content that was fetched successfully
        if let Err(e) = self.cache.put(&entry).await {
            warn!(url = %entry.key.url, error = %e, "cache write failed");
        }

        info!(
            url = %entry.key.url,
            strategy = %strategy,
            chars = entry.content.text_chars(),
            "page acquired"
        );

        let attempt = FetchAttempt::new(&entry.key.url, strategy, FetchStatus::Success)
            .with_content_hash(entry.content_hash.clone())
            .with_fetched_at(entry.fetched_at);
        Acquisition::new(attempt, Some(entry.content))
    }

    /// Thin content wins over an error: the page was reachable, just sparse.
    fn unsuccessful(
        &self,
        url: &str,
        strategy: Strategy,
        thin: Option<PageContent>,
        error: Option<FetchErrorKind>,
    ) -> Acquisition {
        let status = match (&thin, error) {
            (Some(_), _) => FetchStatus::Empty,
            (None, Some(kind)) => FetchStatus::Error(kind),
            (None, None) => FetchStatus::Empty,
        };

        info!(url = %url, strategy = %strategy, status = ?status, "page not acquired");

        let mut attempt = FetchAttempt::new(url, strategy, status);
        if let Some(page) = &thin {
            attempt = attempt.with_content_hash(page.content_hash());
        }
        Acquisition::new(attempt, thin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::{MockFetcher, StaticRobots};
    use chrono::Utc;

    const RICH: usize = 600;

    fn rich(url: &str) -> PageContent {
        PageContent::new(url, "Acme builds anvils. ".repeat(RICH / 20))
    }

    fn thin(url: &str) -> PageContent {
        PageContent::new(url, "Loading")
    }

    fn site() -> Site {
        Site::new("Acme", "https://acme.com").unwrap()
    }

    struct Harness {
        orchestrator: FetchOrchestrator,
        static_fetcher: Arc<MockFetcher>,
        renderer: Arc<MockFetcher>,
        cache: Arc<MemoryCache>,
    }

    fn harness(robots: &str, config: AcquisitionConfig) -> Harness {
        let static_fetcher = Arc::new(MockFetcher::new(Strategy::Static));
        let renderer = Arc::new(MockFetcher::new(Strategy::Rendered));
        let cache = Arc::new(MemoryCache::new());
        let policy = Arc::new(PolitenessPolicy::from_config(
            Arc::new(StaticRobots::new(robots)),
            &config,
        ));
        let orchestrator = FetchOrchestrator::new(static_fetcher.clone(), cache.clone(), policy, &config)
            .with_renderer(renderer.clone());
        Harness {
            orchestrator,
            static_fetcher,
            renderer,
            cache,
        }
    }

    fn config() -> AcquisitionConfig {
        AcquisitionConfig::default().with_min_request_interval(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_second_acquire_is_cache_hit() {
        let h = harness("", config());
        let url = "https://acme.com/about";
        h.static_fetcher.add_page(url, rich(url));

        let first = h.orchestrator.acquire(&site(), url).await;
        let second = h.orchestrator.acquire(&site(), url).await;

        assert_eq!(first.status(), FetchStatus::Success);
        assert_eq!(second.status(), FetchStatus::Success);
        assert!(!first.attempt.from_cache);
        assert!(second.attempt.from_cache);
        assert_eq!(first.attempt.content_hash, second.attempt.content_hash);
        assert_eq!(h.static_fetcher.fetch_count(url), 1);
        assert_eq!(h.renderer.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_url_variants_share_cache_entry() {
        let h = harness("", config());
        let url = "https://acme.com/about";
        h.static_fetcher.add_page(url, rich(url));

        let first = h.orchestrator.acquire(&site(), url).await;
        let second = h
            .orchestrator
            .acquire(&site(), "https://ACME.com/about/#team")
            .await;

        assert_eq!(first.status(), FetchStatus::Success);
        assert_eq!(second.status(), FetchStatus::Success);
        assert!(second.attempt.from_cache);
        assert_eq!(second.attempt.url, url);
        assert_eq!(h.static_fetcher.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_thin_static_escalates_once() {
        let h = harness("", config());
        let url = "https://acme.com/team";
        h.static_fetcher.add_page(url, thin(url));
        h.renderer.add_page(url, rich(url));

        let result = h.orchestrator.acquire(&site(), url).await;

        assert_eq!(result.status(), FetchStatus::Success);
        assert_eq!(result.attempt.strategy, Strategy::Rendered);
        assert_eq!(h.static_fetcher.fetch_count(url), 1);
        assert_eq!(h.renderer.fetch_count(url), 1);

        let key = CacheKey::new(site().namespace(), url);
        let cached = h.cache.get(&key).await.unwrap().unwrap();
        assert_eq!(cached.strategy, Strategy::Rendered);
    }

    #[tokio::test]
    async fn test_thin_after_render_is_empty_and_not_cached() {
        let h = harness("", config());
        let url = "https://acme.com/blog";
        h.static_fetcher.add_page(url, thin(url));
        h.renderer.add_page(url, PageContent::new(url, "Still loading..."));

        let result = h.orchestrator.acquire(&site(), url).await;

        assert_eq!(result.status(), FetchStatus::Empty);
        assert_eq!(result.page.unwrap().text, "Still loading...");
        assert!(h.cache.is_empty());
        assert_eq!(h.static_fetcher.fetch_count(url), 1);
        assert_eq!(h.renderer.fetch_count(url), 1);
    }

    #[tokio::test]
    async fn test_both_strategies_fail_reports_last_error() {
        let h = harness("", config());
        let url = "https://acme.com/careers";
        h.static_fetcher.add_error(url, || FetchError::Http {
            url: "https://acme.com/careers".to_string(),
            status: 500,
        });
        h.renderer.add_error(url, || FetchError::Http {
            url: "https://acme.com/careers".to_string(),
            status: 500,
        });

        let result = h.orchestrator.acquire(&site(), url).await;

        assert_eq!(result.status(), FetchStatus::Error(FetchErrorKind::Http));
        assert!(result.page.is_none());
        assert_eq!(h.static_fetcher.fetch_count(url), 1);
        assert_eq!(h.renderer.fetch_count(url), 1);
    }

    #[tokio::test]
    async fn test_thin_static_then_render_error_is_empty() {
        let h = harness("", config());
        let url = "https://acme.com/press";
        h.static_fetcher.add_page(url, thin(url));
        h.renderer.add_error(url, || FetchError::render("https://acme.com/press", "timed out"));

        let result = h.orchestrator.acquire(&site(), url).await;
        assert_eq!(result.status(), FetchStatus::Empty);
        assert_eq!(result.page.unwrap().text, "Loading");
    }

    #[tokio::test]
    async fn test_blocked_calls_no_fetcher() {
        let h = harness("User-agent: *\nDisallow: /legal", config());
        let url = "https://acme.com/legal";
        h.static_fetcher.add_page(url, rich(url));

        let result = h.orchestrator.acquire(&site(), url).await;

        assert_eq!(result.status(), FetchStatus::Blocked);
        assert_eq!(h.static_fetcher.total_calls(), 0);
        assert_eq!(h.renderer.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_entry_refetched_and_force_refresh() {
        let h = harness("", config().with_cache_ttl(Duration::from_secs(60)));
        let url = "https://acme.com/about";
        h.static_fetcher.add_page(url, rich(url));

        let stale = CacheEntry::new(
            CacheKey::new(site().namespace(), url),
            PageContent::new(url, "old"),
            Strategy::Static,
            Duration::from_secs(60),
        )
        .with_fetched_at(Utc::now() - chrono::Duration::seconds(61));
        h.cache.put(&stale).await.unwrap();

        let result = h.orchestrator.acquire(&site(), url).await;
        assert!(!result.attempt.from_cache);
        assert_eq!(h.static_fetcher.fetch_count(url), 1);

        let forced = harness("", config().with_force_refresh(true));
        forced.static_fetcher.add_page(url, rich(url));
        forced.orchestrator.acquire(&site(), url).await;
        forced.orchestrator.acquire(&site(), url).await;
        assert_eq!(forced.static_fetcher.fetch_count(url), 2);
    }

    #[tokio::test]
    async fn test_without_renderer() {
        let config = config();
        let fetcher = Arc::new(MockFetcher::new(Strategy::Static));
        let policy = Arc::new(PolitenessPolicy::from_config(Arc::new(StaticRobots::allow_all()), &config));
        let orchestrator =
            FetchOrchestrator::new(fetcher.clone(), Arc::new(MemoryCache::new()), policy, &config);

        let url = "https://acme.com/x";
        fetcher.add_page(url, thin(url));
        assert_eq!(orchestrator.acquire(&site(), url).await.status(), FetchStatus::Empty);

        let missing = "https://acme.com/missing";
        assert_eq!(
            orchestrator.acquire(&site(), missing).await.status(),
            FetchStatus::Error(FetchErrorKind::Http)
        );
    }
}
