//! Run configuration for the acquisition pipeline.

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AcquisitionError, Result};

/// Default user agent, also matched against robots.txt groups.
pub const DEFAULT_USER_AGENT: &str = "BrochureAI/0.1 (+acquisition)";

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Maximum number of links the classifier may include.
    ///
    /// Default: 12.
    pub max_included_links: usize,

    /// Maximum number of candidate links sent to the classifier.
    ///
    /// Default: 100.
    pub max_candidate_links: usize,

    /// Global cap on concurrent link fetches in the fetching stage.
    ///
    /// Never allowed to exceed `per_domain_concurrency`. Default: 2.
    pub global_concurrency: usize,

    /// Maximum in-flight requests per domain. Default: 2.
    pub per_domain_concurrency: usize,

    /// Minimum spacing between requests to one domain.
    ///
    /// A larger robots.txt crawl-delay wins. Default: 1s.
    pub min_request_interval: Duration,

    /// How long a cached page stays fresh. Default: 7 days.
    pub cache_ttl: Duration,

    /// Ignore cached pages for this run.
    pub force_refresh: bool,

    /// Minimum visible text length for a page to count as sufficient.
    ///
    /// Below this the static result escalates to rendering. Default: 500.
    pub min_content_chars: usize,

    /// Per-page text is truncated to this many characters. Default: 15000.
    pub max_content_chars: usize,

    /// Deadline for the whole run. `None` means unbounded.
    pub run_timeout: Option<Duration>,

    /// Deadline for one classifier attempt. Default: 30s.
    pub classifier_timeout: Duration,

    /// Classifier attempts before falling back to keywords. Default: 3.
    pub classifier_attempts: u32,

    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_included_links: 12,
            max_candidate_links: 100,
            global_concurrency: 2,
            per_domain_concurrency: 2,
            min_request_interval: Duration::from_secs(1),
            cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            force_refresh: false,
            min_content_chars: 500,
            max_content_chars: 15_000,
            run_timeout: None,
            classifier_timeout: Duration::from_secs(30),
            classifier_attempts: 3,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AcquisitionConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Reads a `.env` file if one is present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let mut config = Self::default();

        if let Some(v) = parse_var::<usize>("ACQUISITION_MAX_LINKS")? {
            config.max_included_links = v;
        }
        if let Some(v) = parse_var::<usize>("ACQUISITION_CONCURRENCY")? {
            config.global_concurrency = v;
        }
        if let Some(v) = parse_var::<usize>("ACQUISITION_DOMAIN_CONCURRENCY")? {
            config.per_domain_concurrency = v;
        }
        if let Some(v) = parse_var::<f64>("RATE_LIMIT_DELAY")? {
            config.min_request_interval = secs_f64("RATE_LIMIT_DELAY", v)?;
        }
        if let Some(v) = parse_var::<u64>("ACQUISITION_CACHE_TTL_HOURS")? {
            config.cache_ttl = hours("ACQUISITION_CACHE_TTL_HOURS", v)?;
        }
        if let Some(v) = parse_var::<bool>("ACQUISITION_FORCE_REFRESH")? {
            config.force_refresh = v;
        }
        if let Some(v) = parse_var::<usize>("ACQUISITION_MIN_CONTENT_CHARS")? {
            config.min_content_chars = v;
        }
        if let Some(v) = parse_var::<u64>("ACQUISITION_RUN_TIMEOUT_SECS")? {
            config.run_timeout = Some(Duration::from_secs(v));
        }
        if let Ok(agent) = env::var("ACQUISITION_USER_AGENT") {
            config.user_agent = agent;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.per_domain_concurrency == 0 || self.global_concurrency == 0 {
            return Err(AcquisitionError::Config(
                "concurrency limits must be at least 1".into(),
            ));
        }
        if self.classifier_attempts == 0 {
            return Err(AcquisitionError::Config(
                "classifier_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Concurrency actually used by the fetching stage.
    pub fn effective_concurrency(&self) -> usize {
        self.global_concurrency.min(self.per_domain_concurrency).max(1)
    }

    /// Set the inclusion cap.
    pub fn with_max_included_links(mut self, max: usize) -> Self {
        self.max_included_links = max;
        self
    }

    /// Set the number of candidates sent to the classifier.
    pub fn with_max_candidate_links(mut self, max: usize) -> Self {
        self.max_candidate_links = max;
        self
    }

    /// Set the global fetch concurrency.
    pub fn with_global_concurrency(mut self, n: usize) -> Self {
        self.global_concurrency = n;
        self
    }

    /// Set the per-domain concurrency cap.
    pub fn with_per_domain_concurrency(mut self, n: usize) -> Self {
        self.per_domain_concurrency = n;
        self
    }

    /// Set the minimum per-domain request interval.
    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    /// Set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Bypass cached pages for this run.
    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Set the content richness threshold.
    pub fn with_min_content_chars(mut self, chars: usize) -> Self {
        self.min_content_chars = chars;
        self
    }

    /// Set the per-page truncation limit.
    pub fn with_max_content_chars(mut self, chars: usize) -> Self {
        self.max_content_chars = chars;
        self
    }

    /// Set the run deadline.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Set the per-attempt classifier timeout.
    pub fn with_classifier_timeout(mut self, timeout: Duration) -> Self {
        self.classifier_timeout = timeout;
        self
    }

    /// Set the number of classifier attempts.
    pub fn with_classifier_attempts(mut self, attempts: u32) -> Self {
        self.classifier_attempts = attempts;
        self
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AcquisitionError::Config(format!("{name} is invalid: {e}").into())),
        Err(_) => Ok(None),
    }
}

fn secs_f64(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| AcquisitionError::Config(format!("{name} is invalid: {e}").into()))
}

fn hours(name: &str, value: u64) -> Result<Duration> {
    value
        .checked_mul(60 * 60)
        .map(Duration::from_secs)
        .ok_or_else(|| AcquisitionError::Config(format!("{name} is too large: {value}").into()))
}
