//! Relevance classification of homepage links.
//!
//! The collaborator (an LLM behind [`LinkClassifier`]) is treated as an
//! untrusted oracle: its answer is parsed leniently, validated against the
//! offered links, and capped. Any failure falls back to
//! [`keywords::classify_by_keywords`], so classification always yields a
//! result.

pub mod keywords;
pub mod openai;
pub mod request;
pub mod response;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AcquisitionConfig;
use crate::error::{ClassificationError, ClassificationResult};
use crate::types::decision::{Classification, ClassificationSource, RelevanceDecision};
use crate::types::link::Link;
use crate::types::site::Site;

pub use keywords::classify_by_keywords;
pub use openai::OpenAiClassifier;
pub use request::{CandidateLink, ClassificationRequest};
pub use response::{parse_response, validate_response, RelevantLink, RelevantLinksResponse};

/// External classification collaborator.
///
/// Returns the raw response text; parsing and validation happen in
/// [`RelevanceClassifier`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkClassifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult<String>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Classifies discovered links, falling back to keywords on any failure.
pub struct RelevanceClassifier {
    collaborator: Option<Arc<dyn LinkClassifier>>,
    max_included: usize,
    max_candidates: usize,
    attempts: u32,
    timeout: Duration,
}

impl RelevanceClassifier {
    pub fn new(collaborator: Arc<dyn LinkClassifier>, config: &AcquisitionConfig) -> Self {
        Self {
            collaborator: Some(collaborator),
            ..Self::keyword_only(config)
        }
    }

    /// A classifier that never calls out and always uses keywords.
    pub fn keyword_only(config: &AcquisitionConfig) -> Self {
        Self {
            collaborator: None,
            max_included: config.max_included_links,
            max_candidates: config.max_candidate_links,
            attempts: config.classifier_attempts.max(1),
            timeout: config.classifier_timeout,
        }
    }

    /// One decision per link; included decisions first, in priority order.
    pub async fn classify(&self, site: &Site, links: &[Link]) -> Classification {
        let Some(collaborator) = &self.collaborator else {
            return self.fallback(links);
        };
        if links.is_empty() {
            return self.fallback(links);
        }

        let candidates = &links[..links.len().min(self.max_candidates)];
        let request = ClassificationRequest::new(site, candidates, self.max_included);

        for attempt in 1..=self.attempts {
            match self.attempt(collaborator.as_ref(), &request).await {
                Ok(included) => {
                    info!(
                        classifier = collaborator.name(),
                        candidates = candidates.len(),
                        included = included.len(),
                        "links classified"
                    );
                    return Classification {
                        decisions: with_excluded(included, links),
                        source: ClassificationSource::Collaborator,
                    };
                }
                Err(e) => {
                    warn!(
                        classifier = collaborator.name(),
                        attempt,
                        attempts = self.attempts,
                        error = %e,
                        "classification attempt failed"
                    );
                    if attempt < self.attempts {
                        tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
                    }
                }
            }
        }

        warn!("classifier unavailable, using keyword fallback");
        self.fallback(links)
    }

    async fn attempt(
        &self,
        collaborator: &dyn LinkClassifier,
        request: &ClassificationRequest,
    ) -> ClassificationResult<Vec<RelevanceDecision>> {
        let raw = tokio::time::timeout(self.timeout, collaborator.classify(request))
            .await
            .map_err(|_| ClassificationError::Timeout)??;

        let parsed = parse_response(&raw)?;
        Ok(validate_response(parsed, request, self.max_included))
    }

    /// Deterministic keyword classification.
    pub fn fallback(&self, links: &[Link]) -> Classification {
        Classification {
            decisions: classify_by_keywords(links, self.max_included),
            source: ClassificationSource::KeywordFallback,
        }
    }
}

/// Append an excluded decision for every link not already included.
fn with_excluded(mut included: Vec<RelevanceDecision>, links: &[Link]) -> Vec<RelevanceDecision> {
    let chosen: HashSet<String> = included.iter().map(|d| d.url.clone()).collect();
    included.extend(
        links
            .iter()
            .filter(|l| !chosen.contains(&l.url))
            .map(|l| RelevanceDecision::excluded(&l.url)),
    );
    included
}
