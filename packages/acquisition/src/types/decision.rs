//! Relevance decisions produced by classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Corporate page categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    About,
    Careers,
    Customers,
    Team,
    Products,
    Blog,
    Press,
    Culture,
    Values,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::About,
        Category::Careers,
        Category::Customers,
        Category::Team,
        Category::Products,
        Category::Blog,
        Category::Press,
        Category::Culture,
        Category::Values,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::About => "about",
            Category::Careers => "careers",
            Category::Customers => "customers",
            Category::Team => "team",
            Category::Products => "products",
            Category::Blog => "blog",
            Category::Press => "press",
            Category::Culture => "culture",
            Category::Values => "values",
            Category::Other => "other",
        }
    }

    /// Parse a collaborator-supplied label. Unknown labels become `Other`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == label)
            .unwrap_or(Category::Other)
    }

    /// Human-readable section title.
    pub fn title(&self) -> &'static str {
        match self {
            Category::About => "About",
            Category::Careers => "Careers",
            Category::Customers => "Customers",
            Category::Team => "Team",
            Category::Products => "Products & Services",
            Category::Blog => "Blog",
            Category::Press => "Press",
            Category::Culture => "Culture",
            Category::Values => "Mission & Values",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification outcome for one discovered link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceDecision {
    pub url: String,
    pub category: Category,
    pub included: bool,

    /// Collaborator or heuristic explanation, if any
    #[serde(default)]
    pub reason: Option<String>,
}

impl RelevanceDecision {
    pub fn included(url: impl Into<String>, category: Category) -> Self {
        Self {
            url: url.into(),
            category,
            included: true,
            reason: None,
        }
    }

    pub fn excluded(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: Category::Other,
            included: false,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// How a set of decisions was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Collaborator,
    KeywordFallback,
}

/// Decisions for every candidate link, included ones first in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub decisions: Vec<RelevanceDecision>,
    pub source: ClassificationSource,
}

impl Classification {
    /// Included decisions, in priority order.
    pub fn included(&self) -> impl Iterator<Item = &RelevanceDecision> {
        self.decisions.iter().filter(|d| d.included)
    }

    pub fn included_count(&self) -> usize {
        self.included().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_label() {
        assert_eq!(Category::from_label("Careers"), Category::Careers);
        assert_eq!(Category::from_label(" values "), Category::Values);
        assert_eq!(Category::from_label("investors"), Category::Other);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Category::Press).unwrap();
        assert_eq!(json, "\"press\"");
    }
}
