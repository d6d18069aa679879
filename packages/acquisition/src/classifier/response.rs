//! Parsing and validation of classifier responses.
//!
//! Responses are untrusted: they may be wrapped in prose or code fences,
//! name URLs that were never offered, or exceed the inclusion cap.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::classifier::request::ClassificationRequest;
use crate::error::{ClassificationError, ClassificationResult};
use crate::types::decision::{Category, RelevanceDecision};

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));

/// Structured classifier output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RelevantLinksResponse {
    pub relevant_links: Vec<RelevantLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelevantLink {
    pub url: String,
    /// Page type label
    #[serde(rename = "type", default)]
    pub category: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Parse a raw response: bare JSON, a fenced block, or JSON inside prose.
pub fn parse_response(raw: &str) -> ClassificationResult<RelevantLinksResponse> {
    let raw = raw.trim();

    if let Ok(parsed) = serde_json::from_str::<RelevantLinksResponse>(raw) {
        return Ok(parsed);
    }

    if let Some(block) = FENCED_JSON.captures(raw).and_then(|c| c.get(1)) {
        if let Ok(parsed) = serde_json::from_str::<RelevantLinksResponse>(block.as_str()) {
            return Ok(parsed);
        }
    }

    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str::<RelevantLinksResponse>(&raw[start..=end]) {
                return Ok(parsed);
            }
        }
    }

    let preview: String = raw.chars().take(120).collect();
    Err(ClassificationError::Malformed(format!(
        "no relevant_links object in response: {preview}"
    )))
}

/// Keep only offered URLs, drop repeats, and cap the included set.
///
/// Collaborator order is preserved. Returned decisions are all `included`.
pub fn validate_response(
    response: RelevantLinksResponse,
    request: &ClassificationRequest,
    max_included: usize,
) -> Vec<RelevanceDecision> {
    let mut seen = HashSet::new();
    let mut decisions = Vec::new();

    for link in response.relevant_links {
        if decisions.len() >= max_included {
            break;
        }
        if !request.contains_url(&link.url) {
            debug!(url = %link.url, "classifier returned unknown URL, dropping");
            continue;
        }
        if !seen.insert(link.url.clone()) {
            continue;
        }

        let mut decision = RelevanceDecision::included(link.url, Category::from_label(&link.category));
        decision.reason = link.reason;
        decisions.push(decision);
    }

    decisions
}
