//! Typed errors for the acquisition library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a single fetch strategy.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, DNS failure or request timeout
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Server answered with a non-2xx status
    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    /// Headless rendering timed out, crashed or could not be started
    #[error("render failed for {url}: {reason}")]
    Render { url: String, reason: String },

    /// URL could not be parsed or has an unsupported scheme
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Network {
            url: url.into(),
            source: Box::new(source),
        }
    }

    pub fn render(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Render {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Coarse kind recorded on a [`FetchAttempt`](crate::types::fetch::FetchAttempt).
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network { .. } | Self::InvalidUrl { .. } => FetchErrorKind::Network,
            Self::Http { .. } => FetchErrorKind::Http,
            Self::Render { .. } => FetchErrorKind::Render,
        }
    }
}

/// Fetch failure kinds, as reported per link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Network,
    Http,
    Render,
}

/// Failures of the relevance classification collaborator.
///
/// These never escape the classifier: every variant is recovered through
/// the keyword fallback.
#[derive(Debug, Error)]
pub enum ClassificationError {
    /// Collaborator unreachable or returned an error response
    #[error("classifier unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Collaborator did not answer in time
    #[error("classifier timed out")]
    Timeout,

    /// Response could not be parsed into link decisions
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// Run-level errors.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Neither the homepage nor any selected link produced content
    #[error("no content acquired for {site}")]
    NoContentAcquired { site: String },

    /// Homepage could not be fetched or was disallowed
    #[error("homepage unavailable for {url}: {reason}")]
    HomepageUnavailable { url: String, reason: String },

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Configuration error
    #[error("config error: {0}")]
    Config(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Site URL could not be parsed
    #[error("invalid site URL: {url}")]
    InvalidSite { url: String },

    /// Run deadline elapsed or the run was cancelled before discovery finished
    #[error("run cancelled")]
    Cancelled,

    /// Generation stage failed after the corpus was built
    #[error("generation failed: {0}")]
    Generation(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for run-level operations.
pub type Result<T> = std::result::Result<T, AcquisitionError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for classification calls.
pub type ClassificationResult<T> = std::result::Result<T, ClassificationError>;
