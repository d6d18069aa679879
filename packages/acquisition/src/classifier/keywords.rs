//! Deterministic keyword classification.
//!
//! Used whenever the classification collaborator is missing, fails, times
//! out or answers with something unparsable. Matches whole words of the
//! anchor text and URL path against a fixed English/Spanish table.

use std::collections::HashSet;

use crate::types::decision::{Category, RelevanceDecision};
use crate::types::link::Link;

/// Only the first links on a page are considered.
pub const MAX_LINKS_EXAMINED: usize = 80;

/// Category keywords, checked in table order.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::About,
        &["about", "about-us", "acerca", "quienes-somos", "nosotros", "who-we-are", "our-story", "company"],
    ),
    (
        Category::Careers,
        &["careers", "career", "jobs", "job", "trabajo", "empleo", "vacantes", "join-us", "hiring"],
    ),
    (
        Category::Customers,
        &["customers", "customer", "clientes", "case-studies", "casos", "success-stories"],
    ),
    (
        Category::Team,
        &["team", "equipo", "leadership", "people", "leaders", "management"],
    ),
    (
        Category::Products,
        &["products", "product", "productos", "services", "service", "servicios", "solutions", "soluciones", "platform"],
    ),
    (Category::Blog, &["blog", "news", "noticias", "articles", "insights"]),
    (Category::Press, &["press", "prensa", "media", "newsroom"]),
    (Category::Culture, &["culture", "cultura", "life-at"]),
    (
        Category::Values,
        &["values", "valores", "mission", "mision", "vision", "purpose", "sustainability"],
    ),
];

/// Utility pages never worth including.
const EXCLUDED_KEYWORDS: &[&str] = &[
    "privacy", "terms", "legal", "cookie", "cookies", "login", "log-in", "signin", "sign-in",
    "signup", "sign-up", "register", "cart", "checkout", "account", "pricing", "api", "docs",
    "documentation", "github",
];

/// Lower-case words joined by `-`, with `-` at both ends.
///
/// `About Us` and `/about-us/` both become `-about-us-`, so multi-word
/// keywords match either source and partial words never match.
fn word_key(text: &str) -> String {
    let mut key = String::from("-");
    let mut last_dash = true;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            key.push(c);
            last_dash = false;
        } else if !last_dash {
            key.push('-');
            last_dash = true;
        }
    }
    if !last_dash {
        key.push('-');
    }
    key
}

fn matches_keyword(key: &str, keyword: &str) -> bool {
    key.contains(&format!("-{keyword}-"))
}

fn is_excluded(key: &str) -> bool {
    EXCLUDED_KEYWORDS.iter().any(|k| matches_keyword(key, k))
}

/// First category in table order matching `key` that is not in `taken`.
fn category_for(key: &str, taken: &HashSet<Category>) -> Option<(Category, &'static str)> {
    CATEGORY_KEYWORDS
        .iter()
        .filter(|(category, _)| !taken.contains(category))
        .find_map(|(category, keywords)| {
            keywords
                .iter()
                .find(|k| matches_keyword(key, k))
                .map(|k| (*category, *k))
        })
}

/// Classify links by keyword, at most one link per category.
///
/// Returns one decision per input link: included links first in input
/// order, then the rest.
pub fn classify_by_keywords(links: &[Link], max_included: usize) -> Vec<RelevanceDecision> {
    let mut used: HashSet<Category> = HashSet::new();
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (i, link) in links.iter().enumerate() {
        if i >= MAX_LINKS_EXAMINED || included.len() >= max_included {
            excluded.push(RelevanceDecision::excluded(&link.url));
            continue;
        }

        let anchor_key = word_key(&link.anchor_text);
        let path_key = word_key(&link.path());

        if is_excluded(&anchor_key) || is_excluded(&path_key) {
            excluded.push(RelevanceDecision::excluded(&link.url).with_reason("utility page"));
            continue;
        }

        let matched = category_for(&anchor_key, &used).or_else(|| category_for(&path_key, &used));
        if let Some((category, keyword)) = matched {
            used.insert(category);
            included.push(
                RelevanceDecision::included(&link.url, category)
                    .with_reason(format!("keyword match: {keyword}")),
            );
            continue;
        }

        let none = HashSet::new();
        match category_for(&anchor_key, &none).or_else(|| category_for(&path_key, &none)) {
            Some((category, _)) => {
                excluded.push(RelevanceDecision {
                    url: link.url.clone(),
                    category,
                    included: false,
                    reason: Some("category already covered".to_string()),
                });
            }
            None => excluded.push(RelevanceDecision::excluded(&link.url)),
        }
    }

    included.extend(excluded);
    included
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(path: &str, anchor: &str) -> Link {
        Link::new(format!("https://acme.com{path}"), anchor, "https://acme.com/")
    }

    fn included_urls(decisions: &[RelevanceDecision]) -> Vec<&str> {
        decisions
            .iter()
            .filter(|d| d.included)
            .map(|d| d.url.as_str())
            .collect()
    }

    #[test]
    fn test_about_included_cart_excluded() {
        let links = vec![link("/about", "About Us"), link("/cart", "Cart")];

        let first = classify_by_keywords(&links, 12);
        let second = classify_by_keywords(&links, 12);

        assert_eq!(included_urls(&first), vec!["https://acme.com/about"]);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].category, Category::About);
    }

    #[test]
    fn test_matches_anchor_or_path() {
        let links = vec![
            link("/company/who-we-are", "Learn more"),
            link("/x1", "Join our team"),
            link("/equipo", ""),
        ];
        let decisions = classify_by_keywords(&links, 12);
        let cats: Vec<_> = decisions.iter().filter(|d| d.included).map(|d| d.category).collect();
        assert_eq!(cats, vec![Category::About, Category::Team]);
    }

    #[test]
    fn test_one_link_per_category() {
        let links = vec![
            link("/careers", "Careers"),
            link("/jobs", "Open jobs"),
            link("/blog", "Blog"),
        ];
        let decisions = classify_by_keywords(&links, 12);
        assert_eq!(
            included_urls(&decisions),
            vec!["https://acme.com/careers", "https://acme.com/blog"]
        );
    }

    #[test]
    fn test_link_falls_through_to_free_category() {
        // "Company news" hits about first, then blog
        let links = vec![link("/about", "About"), link("/updates", "Company news")];
        let decisions = classify_by_keywords(&links, 12);

        assert_eq!(
            included_urls(&decisions),
            vec!["https://acme.com/about", "https://acme.com/updates"]
        );
        assert_eq!(decisions[1].category, Category::Blog);
        assert_eq!(decisions[1].reason.as_deref(), Some("keyword match: news"));
    }

    #[test]
    fn test_covered_category_reason() {
        let links = vec![link("/careers", "Careers"), link("/jobs", "Jobs")];
        let decisions = classify_by_keywords(&links, 12);
        assert_eq!(decisions[1].category, Category::Careers);
        assert_eq!(decisions[1].reason.as_deref(), Some("category already covered"));
    }

    #[test]
    fn test_partial_words_do_not_match() {
        // "capital" contains "api", "aboutique" contains "about"
        let links = vec![link("/capital", "Capital"), link("/aboutique", "Aboutique")];
        let decisions = classify_by_keywords(&links, 12);
        assert!(included_urls(&decisions).is_empty());
        assert!(decisions.iter().all(|d| d.reason.as_deref() != Some("utility page")));
    }

    #[test]
    fn test_exclusions_win() {
        let links = vec![link("/about/privacy", "Privacy"), link("/developers", "API docs")];
        assert!(included_urls(&classify_by_keywords(&links, 12)).is_empty());
    }

    #[test]
    fn test_cap_and_examined_window() {
        let mut links: Vec<Link> = (0..MAX_LINKS_EXAMINED)
            .map(|i| link(&format!("/filler-{i}"), "Filler"))
            .collect();
        links.push(link("/about", "About"));

        let decisions = classify_by_keywords(&links, 12);
        assert!(included_urls(&decisions).is_empty());
        assert_eq!(decisions.len(), MAX_LINKS_EXAMINED + 1);

        let links = vec![link("/about", "About"), link("/team", "Team"), link("/blog", "Blog")];
        assert_eq!(included_urls(&classify_by_keywords(&links, 2)).len(), 2);
    }
}
