//! Testing utilities including mock implementations.
//!
//! These let applications exercise the acquisition pipeline without network
//! access or a live classification service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

use crate::classifier::{ClassificationRequest, LinkClassifier};
use crate::error::{ClassificationError, ClassificationResult, FetchError, FetchResult};
use crate::fetchers::Fetcher;
use crate::politeness::robots::{RobotsSource, RobotsTxt};
use crate::types::fetch::{FetchedPage, PageContent, Strategy};
use crate::types::link::Link;

type ErrorFactory = Arc<dyn Fn() -> FetchError + Send + Sync>;

#[derive(Clone)]
enum Scripted {
    Page(PageContent),
    Error(ErrorFactory),
}

/// A scripted fetcher.
///
/// Unknown URLs fail with HTTP 404. Every call is recorded, and the peak
/// number of concurrent calls is tracked for politeness assertions.
pub struct MockFetcher {
    strategy: Strategy,
    responses: RwLock<HashMap<String, Scripted>>,
    calls: RwLock<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            responses: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold each call open for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_page(self, url: &str, page: PageContent) -> Self {
        self.add_page(url, page);
        self
    }

    /// Serve `page` for `url`.
    pub fn add_page(&self, url: &str, page: PageContent) {
        self.responses
            .write()
            .unwrap()
            .insert(url.to_string(), Scripted::Page(page));
    }

    /// Serve an HTML document for `url`, extracted like a real fetch.
    pub fn add_html(&self, url: &str, html: &str) {
        let parsed = Url::parse(url).expect("mock URL must be absolute");
        self.add_page(url, crate::html::extract_page(html, &parsed, usize::MAX));
    }

    /// Fail `url` with the error built by `make`.
    pub fn add_error(&self, url: &str, make: impl Fn() -> FetchError + Send + Sync + 'static) {
        self.responses
            .write()
            .unwrap()
            .insert(url.to_string(), Scripted::Error(Arc::new(make)));
    }

    /// All fetched URLs, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.calls.read().unwrap().iter().filter(|u| *u == url).count()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.responses.read().unwrap().get(url).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match scripted {
            Some(Scripted::Page(content)) => Ok(FetchedPage {
                content,
                strategy: self.strategy,
            }),
            Some(Scripted::Error(make)) => Err(make()),
            None => Err(FetchError::Http {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    fn strategy(&self) -> Strategy {
        self.strategy
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Robots source serving fixed content, counting loads.
pub struct StaticRobots {
    content: String,
    loads: AtomicUsize,
}

impl StaticRobots {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn allow_all() -> Self {
        Self::new("")
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RobotsSource for StaticRobots {
    async fn load(&self, _origin: &Url) -> RobotsTxt {
        self.loads.fetch_add(1, Ordering::SeqCst);
        RobotsTxt::parse(&self.content)
    }
}

#[derive(Clone)]
enum ClassifierBehavior {
    Respond(String),
    Fail,
    Hang,
}

/// A scripted classification collaborator.
pub struct MockClassifier {
    behavior: ClassifierBehavior,
    requests: RwLock<Vec<ClassificationRequest>>,
}

impl MockClassifier {
    /// Answer every request with `raw`.
    pub fn responding(raw: impl Into<String>) -> Self {
        Self::with_behavior(ClassifierBehavior::Respond(raw.into()))
    }

    /// Answer with a well-formed response including `urls` as `(url, type)`.
    pub fn including(links: &[(&str, &str)]) -> Self {
        let relevant: Vec<_> = links
            .iter()
            .map(|(url, kind)| serde_json::json!({ "url": url, "type": kind, "reason": "relevant" }))
            .collect();
        Self::responding(serde_json::json!({ "relevant_links": relevant }).to_string())
    }

    /// Fail every request as unavailable.
    pub fn failing() -> Self {
        Self::with_behavior(ClassifierBehavior::Fail)
    }

    /// Never answer.
    pub fn hanging() -> Self {
        Self::with_behavior(ClassifierBehavior::Hang)
    }

    fn with_behavior(behavior: ClassifierBehavior) -> Self {
        Self {
            behavior,
            requests: RwLock::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ClassificationRequest> {
        self.requests.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.read().unwrap().len()
    }
}

#[async_trait]
impl LinkClassifier for MockClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult<String> {
        self.requests.write().unwrap().push(request.clone());
        match &self.behavior {
            ClassifierBehavior::Respond(raw) => Ok(raw.clone()),
            ClassifierBehavior::Fail => Err(ClassificationError::Unavailable(
                "mock classifier unavailable".into(),
            )),
            ClassifierBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(ClassificationError::Timeout)
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A page with enough text to pass the default richness threshold.
pub fn rich_page(url: &str, topic: &str) -> PageContent {
    let sentence = format!("{topic} is described here in detail. ");
    PageContent::new(url, sentence.repeat(600 / sentence.len() + 1)).with_title(topic)
}

/// A homepage linking to `paths` with their anchor text.
pub fn homepage(url: &str, links: &[(&str, &str)], text: &str) -> PageContent {
    let base = Url::parse(url).expect("mock URL must be absolute");
    let links = links
        .iter()
        .filter_map(|(path, anchor)| {
            base.join(path)
                .ok()
                .map(|u| Link::new(u.as_str(), *anchor, url))
        })
        .collect();
    PageContent::new(url, text).with_links(links)
}
