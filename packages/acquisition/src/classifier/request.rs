//! Classification request and prompts.

use serde::{Deserialize, Serialize};

use crate::types::link::Link;
use crate::types::site::Site;

/// A link as shown to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    pub url: String,
    pub anchor_text: String,
}

/// One classification call: the homepage link set for a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub company_name: String,
    pub base_url: String,
    /// Candidate links in discovery order
    pub links: Vec<CandidateLink>,
    /// Maximum number of links the classifier should return
    pub max_links: usize,
}

pub const SYSTEM_PROMPT: &str = r#"You select pages from a company website that are useful for writing a corporate brochure.

Relevant page types: about, careers, customers, team, products, blog, press, culture, values.
Skip legal pages (privacy, terms, cookies), account pages (login, signup, cart, checkout), pricing, developer documentation and external profiles.

Only return URLs that appear in the provided list, copied exactly.
Order the result from most to least useful.

Respond with JSON only:
{"relevant_links": [{"url": "<url>", "type": "<page type>", "reason": "<short reason>"}]}"#;

impl ClassificationRequest {
    pub fn new(site: &Site, links: &[Link], max_links: usize) -> Self {
        Self {
            company_name: site.company_name.clone(),
            base_url: site.homepage().to_string(),
            links: links
                .iter()
                .map(|l| CandidateLink {
                    url: l.url.clone(),
                    anchor_text: l.anchor_text.clone(),
                })
                .collect(),
            max_links,
        }
    }

    /// User message listing the candidate links.
    pub fn user_prompt(&self) -> String {
        let mut prompt = format!(
            "Company: {}\nWebsite: {}\nReturn at most {} links.\n\nLinks found on the homepage:\n",
            self.company_name, self.base_url, self.max_links
        );

        for link in &self.links {
            if link.anchor_text.is_empty() {
                prompt.push_str(&format!("- {}\n", link.url));
            } else {
                prompt.push_str(&format!("- {} ({})\n", link.url, link.anchor_text));
            }
        }

        prompt
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.links.iter().any(|l| l.url == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_lists_links() {
        let site = Site::new("Acme", "https://acme.com").unwrap();
        let links = vec![
            Link::new("https://acme.com/about", "About Us", "https://acme.com/"),
            Link::new("https://acme.com/jobs", "", "https://acme.com/"),
        ];
        let request = ClassificationRequest::new(&site, &links, 12);
        let prompt = request.user_prompt();

        assert!(prompt.contains("Company: Acme"));
        assert!(prompt.contains("- https://acme.com/about (About Us)\n"));
        assert!(prompt.contains("- https://acme.com/jobs\n"));
        assert!(request.contains_url("https://acme.com/jobs"));
        assert!(!request.contains_url("https://acme.com/jobs/"));
    }
}
