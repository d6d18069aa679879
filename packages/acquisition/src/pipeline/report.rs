//! Run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::decision::{Category, ClassificationSource};
use crate::types::fetch::{FetchStatus, Strategy};

use super::PipelineState;

/// What happened to one selected link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkOutcome {
    pub url: String,
    pub category: Category,
    pub status: FetchStatus,
    /// `None` when the fetch never ran
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub from_cache: bool,
}

/// Completeness of a run.
///
/// A run can succeed while skipping links; the counters make that visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionReport {
    pub run_id: Uuid,
    pub company_name: String,
    pub base_url: String,

    /// Homepage outcome
    pub homepage_status: FetchStatus,
    pub landing_acquired: bool,

    /// Candidate links discovered on the homepage
    pub discovered: usize,
    pub classification_source: ClassificationSource,

    /// Links selected for fetching
    pub selected: usize,
    pub acquired: usize,
    pub skipped: usize,
    pub blocked: usize,
    pub empty: usize,
    pub errored: usize,
    pub cancelled: usize,
    pub from_cache: usize,

    /// Selected links, in classification order
    pub outcomes: Vec<LinkOutcome>,

    /// States visited, in order
    pub states: Vec<PipelineState>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AcquisitionReport {
    /// Fill the counters from `outcomes`.
    pub(crate) fn tally(&mut self) {
        self.selected = self.outcomes.len();
        self.acquired = 0;
        self.blocked = 0;
        self.empty = 0;
        self.errored = 0;
        self.cancelled = 0;
        self.from_cache = 0;

        for outcome in &self.outcomes {
            match outcome.status {
                FetchStatus::Success => self.acquired += 1,
                FetchStatus::Blocked => self.blocked += 1,
                FetchStatus::Empty => self.empty += 1,
                FetchStatus::Error(_) => self.errored += 1,
                FetchStatus::Cancelled => self.cancelled += 1,
            }
            if outcome.from_cache {
                self.from_cache += 1;
            }
        }

        self.skipped = self.selected - self.acquired;
    }

    /// One-line summary for logs and CLI output.
    pub fn summary(&self) -> String {
        format!(
            "acquired {} of {} selected links for {} ({} skipped: {} blocked, {} empty, {} errored, {} cancelled; {} from cache)",
            self.acquired,
            self.selected,
            self.company_name,
            self.skipped,
            self.blocked,
            self.empty,
            self.errored,
            self.cancelled,
            self.from_cache,
        )
    }
}
