//! Pipeline controller: discovery, classification, fetching, aggregation.
//!
//! ```text
//! Idle -> Discovering -> Classifying -> Fetching -> Aggregating -> Done
//!              \______________\_____________\____________\-> Failed
//! ```
//!
//! Per-link failures are recorded in the [`AcquisitionReport`] and never
//! abort a run. A run fails only when the homepage cannot be fetched, or
//! when nothing at all was acquired.

pub mod generation;
pub mod report;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::classifier::{LinkClassifier, RelevanceClassifier};
use crate::config::AcquisitionConfig;
use crate::error::{AcquisitionError, Result};
use crate::fetchers::{Fetcher, StaticFetcher};
use crate::orchestrator::{Acquisition, FetchOrchestrator};
use crate::politeness::{HttpRobotsSource, PolitenessPolicy};
use crate::types::corpus::{CorpusAggregate, CorpusEntry};
use crate::types::decision::{Category, RelevanceDecision};
use crate::types::fetch::FetchStatus;
use crate::types::link::dedupe_links;
use crate::types::site::Site;

pub use generation::{GenerationStage, Tone};
pub use report::{AcquisitionReport, LinkOutcome};

/// Pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Discovering,
    Classifying,
    Fetching,
    Aggregating,
    Done,
    Failed,
}

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct AcquisitionRun {
    pub corpus: CorpusAggregate,
    pub report: AcquisitionReport,
}

/// Run deadline: an optional instant plus an external cancellation token.
struct RunDeadline {
    token: CancellationToken,
    at: Option<Instant>,
}

impl RunDeadline {
    async fn expired(&self) {
        match self.at {
            Some(at) => {
                tokio::select! {
                    _ = tokio::time::sleep_until(at) => {}
                    _ = self.token.cancelled() => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    fn is_expired(&self) -> bool {
        self.token.is_cancelled() || self.at.is_some_and(|at| Instant::now() >= at)
    }
}

/// State transitions of one run.
struct StateTrail {
    states: Vec<PipelineState>,
}

impl StateTrail {
    fn new() -> Self {
        Self {
            states: vec![PipelineState::Idle],
        }
    }

    fn enter(&mut self, next: PipelineState) {
        info!(state = ?next, "pipeline state");
        self.states.push(next);
    }
}

/// Top-level acquisition state machine.
///
/// # Example
///
/// ```rust,ignore
/// use acquisition::{AcquisitionConfig, FileCache, PipelineController, Site};
///
/// let config = AcquisitionConfig::from_env()?;
/// let controller = PipelineController::from_config(
///     config,
///     Arc::new(FileCache::new(".cache/acquisition")),
///     None,
///     None,
/// )?;
/// let run = controller.run(&Site::new("Acme", "https://acme.com")?).await?;
/// println!("{}", run.report.summary());
/// ```
pub struct PipelineController {
    orchestrator: Arc<FetchOrchestrator>,
    classifier: RelevanceClassifier,
    config: AcquisitionConfig,
}

impl PipelineController {
    pub fn new(
        orchestrator: Arc<FetchOrchestrator>,
        classifier: RelevanceClassifier,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            orchestrator,
            classifier,
            config,
        }
    }

    /// Wire the default stack: static HTTP fetcher, robots.txt over HTTP,
    /// and optional collaborator and renderer.
    ///
    /// Robots rules are loaded once per domain for the lifetime of the
    /// controller.
    pub fn from_config(
        config: AcquisitionConfig,
        cache: Arc<dyn CacheStore>,
        collaborator: Option<Arc<dyn LinkClassifier>>,
        renderer: Option<Arc<dyn Fetcher>>,
    ) -> Result<Self> {
        config.validate()?;

        let static_fetcher = StaticFetcher::from_config(&config)?;
        let robots = Arc::new(HttpRobotsSource::new(static_fetcher.client().clone()));
        let policy = Arc::new(PolitenessPolicy::from_config(robots, &config));

        let mut orchestrator =
            FetchOrchestrator::new(Arc::new(static_fetcher), cache, policy, &config);
        if let Some(renderer) = renderer {
            orchestrator = orchestrator.with_renderer(renderer);
        }

        let classifier = match collaborator {
            Some(collaborator) => RelevanceClassifier::new(collaborator, &config),
            None => RelevanceClassifier::keyword_only(&config),
        };

        Ok(Self::new(Arc::new(orchestrator), classifier, config))
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Acquire content for `site`, bounded by the configured run timeout.
    pub async fn run(&self, site: &Site) -> Result<AcquisitionRun> {
        self.run_with_cancel(site, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), also stopping when `token` is cancelled.
    ///
    /// Cancellation after discovery still yields whatever was acquired.
    pub async fn run_with_cancel(
        &self,
        site: &Site,
        token: CancellationToken,
    ) -> Result<AcquisitionRun> {
        let deadline = RunDeadline {
            token,
            at: self.config.run_timeout.map(|t| Instant::now() + t),
        };
        let run_id = Uuid::now_v7();
        let span = info_span!("acquisition_run", %run_id, company = %site.company_name);

        self.execute(site, run_id, &deadline).instrument(span).await
    }

    /// Run, then hand the corpus to `stage`.
    pub async fn run_and_generate(
        &self,
        site: &Site,
        stage: &dyn GenerationStage,
        tone: Tone,
    ) -> Result<(AcquisitionRun, String)> {
        let run = self.run(site).await?;
        let text = stage
            .generate(&run.corpus, tone)
            .await
            .map_err(AcquisitionError::Generation)?;
        Ok((run, text))
    }

    async fn execute(
        &self,
        site: &Site,
        run_id: Uuid,
        deadline: &RunDeadline,
    ) -> Result<AcquisitionRun> {
        let started_at = Utc::now();
        let mut trail = StateTrail::new();
        let homepage_url = site.homepage().to_string();

        // Discovering
        trail.enter(PipelineState::Discovering);
        let homepage = tokio::select! {
            biased;
            _ = deadline.expired() => None,
            acquisition = self.orchestrator.acquire(site, &homepage_url) => Some(acquisition),
        };
        let Some(homepage) = homepage else {
            trail.enter(PipelineState::Failed);
            warn!(url = %homepage_url, "run cancelled during discovery");
            return Err(AcquisitionError::Cancelled);
        };

        let homepage_status = homepage.status();
        if matches!(
            homepage_status,
            FetchStatus::Blocked | FetchStatus::Error(_) | FetchStatus::Cancelled
        ) {
            trail.enter(PipelineState::Failed);
            warn!(url = %homepage_url, status = ?homepage_status, "homepage unavailable");
            return Err(AcquisitionError::HomepageUnavailable {
                url: homepage_url,
                reason: format!("{:?}", homepage_status),
            });
        }

        let (landing, links) = match homepage.page {
            Some(page) => {
                let links = dedupe_links(page.links, Some(&homepage_url));
                let landing = homepage_status.is_success().then(|| CorpusEntry {
                    url: homepage_url.clone(),
                    category: Category::Other,
                    title: page.title,
                    content: page.text,
                });
                (landing, links)
            }
            None => (None, Vec::new()),
        };
        info!(links = links.len(), landing = landing.is_some(), "homepage links discovered");

        // Classifying
        trail.enter(PipelineState::Classifying);
        let classification = tokio::select! {
            biased;
            _ = deadline.expired() => {
                warn!("run deadline reached during classification, using keyword fallback");
                self.classifier.fallback(&links)
            }
            classification = self.classifier.classify(site, &links) => classification,
        };
        let selected: Vec<RelevanceDecision> = classification.included().cloned().collect();

        // Fetching
        trail.enter(PipelineState::Fetching);
        let results = self.fetch_selected(site, &selected, deadline).await;

        // Aggregating
        trail.enter(PipelineState::Aggregating);
        let mut corpus = CorpusAggregate::new(site.clone());
        corpus.landing = landing;
        let mut outcomes = Vec::with_capacity(selected.len());

        for (decision, result) in selected.iter().zip(results) {
            let outcome = match result {
                Some(acquisition) => {
                    let outcome = LinkOutcome {
                        url: decision.url.clone(),
                        category: decision.category,
                        status: acquisition.status(),
                        strategy: Some(acquisition.attempt.strategy),
                        from_cache: acquisition.attempt.from_cache,
                    };
                    if let (FetchStatus::Success, Some(page)) = (acquisition.status(), acquisition.page) {
                        corpus.entries.push(CorpusEntry {
                            url: decision.url.clone(),
                            category: decision.category,
                            title: page.title,
                            content: page.text,
                        });
                    }
                    outcome
                }
                None => LinkOutcome {
                    url: decision.url.clone(),
                    category: decision.category,
                    status: FetchStatus::Cancelled,
                    strategy: None,
                    from_cache: false,
                },
            };
            outcomes.push(outcome);
        }

        if corpus.is_empty() {
            trail.enter(PipelineState::Failed);
            warn!(url = %homepage_url, "no content acquired");
            return Err(AcquisitionError::NoContentAcquired {
                site: homepage_url,
            });
        }

        trail.enter(PipelineState::Done);

        let mut report = AcquisitionReport {
            run_id,
            company_name: site.company_name.clone(),
            base_url: homepage_url,
            homepage_status,
            landing_acquired: corpus.landing.is_some(),
            discovered: links.len(),
            classification_source: classification.source,
            selected: 0,
            acquired: 0,
            skipped: 0,
            blocked: 0,
            empty: 0,
            errored: 0,
            cancelled: 0,
            from_cache: 0,
            outcomes,
            states: trail.states,
            started_at,
            finished_at: Utc::now(),
        };
        report.tally();

        let stats = corpus.stats();
        info!(
            sections = stats.sections,
            characters = stats.characters,
            words = stats.words,
            "{}",
            report.summary()
        );

        Ok(AcquisitionRun { corpus, report })
    }

    /// Fetch selected links concurrently, returning results in input order.
    ///
    /// Links still outstanding when the deadline passes come back as `None`.
    async fn fetch_selected(
        &self,
        site: &Site,
        selected: &[RelevanceDecision],
        deadline: &RunDeadline,
    ) -> Vec<Option<Acquisition>> {
        let mut results: Vec<Option<Acquisition>> = vec![None; selected.len()];
        if selected.is_empty() || deadline.is_expired() {
            return results;
        }

        let orchestrator = self.orchestrator.as_ref();
        let mut fetches = stream::iter(selected.iter().enumerate())
            .map(|(i, decision)| async move { (i, orchestrator.acquire(site, &decision.url).await) })
            .buffer_unordered(self.config.effective_concurrency());

        loop {
            tokio::select! {
                biased;
                _ = deadline.expired() => {
                    let outstanding = results.iter().filter(|r| r.is_none()).count();
                    warn!(outstanding, "run deadline reached, cancelling outstanding fetches");
                    break;
                }
                next = fetches.next() => match next {
                    Some((i, acquisition)) => results[i] = Some(acquisition),
                    None => break,
                },
            }
        }

        results
    }
}
