//! The aggregated corpus handed to the generation stage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::decision::Category;
use crate::types::site::Site;

/// Section key used for the homepage.
pub const LANDING_SECTION: &str = "landing";

/// One acquired page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub url: String,
    pub category: Category,
    pub title: Option<String>,
    pub content: String,
}

/// Ordered content acquired for a site.
///
/// `entries` follow classification order regardless of fetch completion
/// order. The homepage text, when sufficient, is kept apart as `landing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusAggregate {
    pub site: Site,
    pub landing: Option<CorpusEntry>,
    pub entries: Vec<CorpusEntry>,
}

/// Size statistics for a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub sections: usize,
    pub characters: usize,
    pub words: usize,
}

impl CorpusAggregate {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            landing: None,
            entries: Vec::new(),
        }
    }

    /// True when nothing at all was acquired.
    pub fn is_empty(&self) -> bool {
        self.landing.is_none() && self.entries.is_empty()
    }

    /// Landing section followed by entries.
    pub fn sections(&self) -> impl Iterator<Item = &CorpusEntry> {
        self.landing.iter().chain(self.entries.iter())
    }

    /// Unique keys for each section, in section order.
    ///
    /// Repeated categories get a numeric suffix: `about`, `about_1`, ...
    pub fn section_keys(&self) -> Vec<String> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut keys = Vec::new();

        if self.landing.is_some() {
            seen.insert(LANDING_SECTION, 1);
            keys.push(LANDING_SECTION.to_string());
        }

        for entry in &self.entries {
            let base = entry.category.as_str();
            let count = seen.entry(base).or_insert(0);
            if *count == 0 {
                keys.push(base.to_string());
            } else {
                keys.push(format!("{}_{}", base, count));
            }
            *count += 1;
        }

        keys
    }

    pub fn stats(&self) -> CorpusStats {
        self.sections().fold(CorpusStats::default(), |mut acc, entry| {
            acc.sections += 1;
            acc.characters += entry.content.chars().count();
            acc.words += entry.content.split_whitespace().count();
            acc
        })
    }

    /// Render the corpus as `## Section` blocks for a generation prompt.
    pub fn to_prompt_sections(&self) -> String {
        let mut out = String::new();

        for (key, entry) in self.section_keys().iter().zip(self.sections()) {
            let heading = if key == LANDING_SECTION {
                "Homepage".to_string()
            } else {
                match &entry.title {
                    Some(title) if !title.trim().is_empty() => {
                        format!("{} ({})", entry.category.title(), title.trim())
                    }
                    _ => entry.category.title().to_string(),
                }
            };

            out.push_str(&format!("## {}\n", heading));
            out.push_str(&format!("Source: {}\n\n", entry.url));
            out.push_str(entry.content.trim());
            out.push_str("\n\n");
        }

        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str, category: Category, content: &str) -> CorpusEntry {
        CorpusEntry {
            url: url.to_string(),
            category,
            title: None,
            content: content.to_string(),
        }
    }

    fn corpus() -> CorpusAggregate {
        let mut corpus = CorpusAggregate::new(Site::new("Acme", "https://acme.com").unwrap());
        corpus.landing = Some(entry("https://acme.com/", Category::Other, "Welcome to Acme"));
        corpus.entries = vec![
            entry("https://acme.com/about", Category::About, "We build things"),
            entry("https://acme.com/story", Category::About, "Founded in 1999"),
            entry("https://acme.com/jobs", Category::Careers, "Join us"),
        ];
        corpus
    }

    #[test]
    fn test_section_keys_are_unique() {
        assert_eq!(
            corpus().section_keys(),
            vec!["landing", "about", "about_1", "careers"]
        );
    }

    #[test]
    fn test_stats() {
        let stats = corpus().stats();
        assert_eq!(stats.sections, 4);
        assert_eq!(stats.words, 3 + 3 + 3 + 2);
    }

    #[test]
    fn test_prompt_sections() {
        let text = corpus().to_prompt_sections();
        assert!(text.starts_with("## Homepage\nSource: https://acme.com/"));
        assert!(text.contains("## About\nSource: https://acme.com/about"));
        assert!(text.ends_with("Join us"));
    }

    #[test]
    fn test_empty() {
        let corpus = CorpusAggregate::new(Site::new("Acme", "https://acme.com").unwrap());
        assert!(corpus.is_empty());
        assert_eq!(corpus.stats(), CorpusStats::default());
    }
}
