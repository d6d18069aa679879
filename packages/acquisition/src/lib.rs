//! Company Site Content Acquisition
//!
//! Turns a company homepage into a corpus of relevant page text for
//! brochure generation.
//!
//! # Pipeline
//!
//! 1. **Discover** - fetch the homepage and collect same-site links
//! 2. **Classify** - pick the links worth reading (LLM, with keyword fallback)
//! 3. **Fetch** - static HTTP first, one escalation to a rendering fetcher
//! 4. **Aggregate** - assemble the corpus in priority order
//!
//! Every fetch goes through the cache and the politeness policy (robots.txt,
//! per-domain spacing and concurrency caps). Per-link failures are reported,
//! never fatal.
//!
//! # Usage
//!
//! ```rust,ignore
//! use acquisition::{AcquisitionConfig, MemoryCache, OpenAiClassifier, PipelineController, Site};
//!
//! let controller = PipelineController::from_config(
//!     AcquisitionConfig::default(),
//!     Arc::new(MemoryCache::new()),
//!     Some(Arc::new(OpenAiClassifier::from_env()?)),
//!     None,
//! )?;
//!
//! let run = controller.run(&Site::new("Acme", "acme.com")?).await?;
//! println!("{}", run.corpus.to_prompt_sections());
//! ```
//!
//! # Modules
//!
//! - [`types`] - Site, link, decision, fetch and corpus types
//! - [`politeness`] - robots.txt and per-domain rate limiting
//! - [`cache`] - Page caches (memory, file, SQLite)
//! - [`fetchers`] - Static, Chromium and Firecrawl fetchers
//! - [`classifier`] - Link relevance classification
//! - [`orchestrator`] - Per-URL cache, politeness and escalation
//! - [`pipeline`] - Run-level state machine and reports
//! - [`testing`] - Mock implementations for testing

pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fetchers;
pub mod html;
pub mod orchestrator;
pub mod pipeline;
pub mod politeness;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use config::AcquisitionConfig;
pub use error::{
    AcquisitionError, ClassificationError, FetchError, FetchErrorKind, Result,
};
pub use types::{
    cache::{CacheEntry, CacheKey},
    corpus::{CorpusAggregate, CorpusEntry, CorpusStats, LANDING_SECTION},
    decision::{Category, Classification, ClassificationSource, RelevanceDecision},
    fetch::{FetchAttempt, FetchStatus, FetchedPage, PageContent, PageSignals, Strategy},
    link::Link,
    site::Site,
};

pub use cache::{CacheStore, FileCache, MemoryCache};

#[cfg(feature = "sqlite")]
pub use cache::SqliteCache;

pub use classifier::{LinkClassifier, OpenAiClassifier, RelevanceClassifier};
pub use fetchers::{ChromeFetcher, Fetcher, FirecrawlFetcher, StaticFetcher};
pub use orchestrator::{Acquisition, FetchOrchestrator};
pub use pipeline::{
    AcquisitionReport, AcquisitionRun, GenerationStage, LinkOutcome, PipelineController,
    PipelineState, Tone,
};
pub use politeness::{PolitenessPolicy, RobotsSource};
