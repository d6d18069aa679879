//! Per-domain crawl rules, request spacing and in-flight caps.

use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AcquisitionConfig;
use crate::politeness::robots::{RobotsSource, RobotsTxt};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Upper bound applied to a robots.txt crawl-delay.
const MAX_CRAWL_DELAY: Duration = Duration::from_secs(30);

/// State for one domain, initialised once per policy.
struct DomainState {
    robots: RobotsTxt,
    limiter: Option<DefaultRateLimiter>,
    slots: Arc<Semaphore>,
}

/// A fetch slot for one domain. The slot is released on drop.
#[derive(Debug)]
pub struct PolitenessPermit {
    _slot: Option<OwnedSemaphorePermit>,
}

/// Politeness rules for the domains touched by a run.
///
/// Robots rules are loaded once per domain on first use and are not
/// re-polled for the lifetime of the policy. Construct one policy per run.
pub struct PolitenessPolicy {
    source: Arc<dyn RobotsSource>,
    user_agent: String,
    min_interval: Duration,
    max_in_flight: usize,
    domains: Mutex<HashMap<String, Arc<OnceCell<Arc<DomainState>>>>>,
}

impl PolitenessPolicy {
    pub fn new(
        source: Arc<dyn RobotsSource>,
        user_agent: impl Into<String>,
        min_interval: Duration,
        max_in_flight: usize,
    ) -> Self {
        Self {
            source,
            user_agent: user_agent.into(),
            min_interval,
            max_in_flight: max_in_flight.max(1),
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Build a policy from run configuration.
    pub fn from_config(source: Arc<dyn RobotsSource>, config: &AcquisitionConfig) -> Self {
        Self::new(
            source,
            config.user_agent.clone(),
            config.min_request_interval,
            config.per_domain_concurrency,
        )
    }

    /// Whether robots.txt permits fetching `url`.
    ///
    /// Unparseable URLs are allowed; the fetcher reports them.
    pub async fn allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let Some(host) = parsed.host_str() else {
            return true;
        };

        let state = self.domain_state(host, &parsed).await;
        let mut target = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            target.push('?');
            target.push_str(query);
        }

        let allowed = state.robots.is_allowed(&self.user_agent, &target);
        if !allowed {
            info!(url = %url, "disallowed by robots.txt");
        }
        allowed
    }

    /// Wait until `domain` has a free slot and the request interval has elapsed.
    ///
    /// Never fails; the returned permit holds the slot until dropped.
    pub async fn wait_token(&self, domain: &str) -> PolitenessPermit {
        let host = domain.to_lowercase();
        let origin = Url::parse(&format!("https://{host}/"));
        let state = match origin {
            Ok(origin) => self.domain_state(&host, &origin).await,
            Err(_) => {
                warn!(domain = %domain, "unparseable domain, proceeding without politeness");
                return PolitenessPermit { _slot: None };
            }
        };

        let slot = match state.slots.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!(domain = %domain, "politeness slots closed, proceeding");
                None
            }
        };

        if let Some(limiter) = &state.limiter {
            limiter.until_ready().await;
        }

        debug!(domain = %domain, "politeness token granted");
        PolitenessPermit { _slot: slot }
    }

    /// Robots rules in effect for `domain`, if already loaded.
    pub fn robots_for(&self, domain: &str) -> Option<RobotsTxt> {
        let domains = self.domains.lock().ok()?;
        domains
            .get(&domain.to_lowercase())
            .and_then(|cell| cell.get())
            .map(|state| state.robots.clone())
    }

    async fn domain_state(&self, host: &str, origin: &Url) -> Arc<DomainState> {
        let cell = {
            // Poisoning only follows a panic elsewhere; the map itself stays valid
            let mut domains = self
                .domains
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            domains
                .entry(host.to_lowercase())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| async {
            let robots = self.source.load(origin).await;
            let crawl_delay = robots
                .crawl_delay(&self.user_agent)
                .map(|d| d.min(MAX_CRAWL_DELAY))
                .unwrap_or_default();
            let interval = self.min_interval.max(crawl_delay);

            info!(
                domain = %host,
                interval_ms = interval.as_millis() as u64,
                max_in_flight = self.max_in_flight,
                "politeness initialised"
            );

            Arc::new(DomainState {
                robots,
                limiter: Quota::with_period(interval).map(RateLimiter::direct),
                slots: Arc::new(Semaphore::new(self.max_in_flight)),
            })
        })
        .await
        .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticRobots;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn policy(robots: &str, interval: Duration, max_in_flight: usize) -> (PolitenessPolicy, Arc<StaticRobots>) {
        let source = Arc::new(StaticRobots::new(robots));
        let policy = PolitenessPolicy::new(source.clone(), "BrochureAI/0.1", interval, max_in_flight);
        (policy, source)
    }

    #[tokio::test]
    async fn test_allowed_respects_robots() {
        let (policy, _) = policy("User-agent: *\nDisallow: /legal", Duration::ZERO, 2);

        assert!(policy.allowed("https://acme.com/about").await);
        assert!(!policy.allowed("https://acme.com/legal/terms").await);
    }

    #[tokio::test]
    async fn test_robots_loaded_once_per_domain() {
        let (policy, source) = policy("", Duration::ZERO, 2);

        for path in ["/a", "/b", "/c"] {
            policy.allowed(&format!("https://acme.com{path}")).await;
        }
        let _permit = policy.wait_token("acme.com").await;
        policy.allowed("https://other.com/").await;

        assert_eq!(source.load_count(), 2);
        assert!(policy.robots_for("acme.com").is_some());
    }

    #[tokio::test]
    async fn test_wait_token_spaces_requests() {
        let (policy, _) = policy("", Duration::from_millis(100), 4);

        let start = Instant::now();
        for _ in 0..3 {
            let _permit = policy.wait_token("acme.com").await;
        }

        // First token is immediate, the next two wait one interval each
        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_crawl_delay_raises_interval() {
        let (policy, _) = policy("User-agent: *\nCrawl-delay: 0.2", Duration::from_millis(10), 4);

        let start = Instant::now();
        for _ in 0..2 {
            let _permit = policy.wait_token("acme.com").await;
        }
        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_in_flight_cap() {
        let (policy, _) = policy("", Duration::ZERO, 2);
        let policy = Arc::new(policy);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let policy = policy.clone();
                let active = active.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    let _permit = policy.wait_token("acme.com").await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
