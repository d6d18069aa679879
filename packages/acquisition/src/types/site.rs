//! Site identity for a run.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AcquisitionError, Result};
use crate::types::link::normalize_url;

/// The company site a run acquires content for.
///
/// Immutable for the duration of a run. The company name scopes the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Normalized homepage URL
    pub base_url: Url,

    /// Company name as given by the caller
    pub company_name: String,
}

impl Site {
    /// Create a site, normalizing the homepage URL.
    ///
    /// A bare host such as `example.com` is read as `https://example.com`.
    pub fn new(company_name: impl Into<String>, base_url: &str) -> Result<Self> {
        let trimmed = base_url.trim();
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        let base_url = normalize_url(&with_scheme, None)
            .and_then(|normalized| Url::parse(&normalized).ok())
            .ok_or_else(|| AcquisitionError::InvalidSite {
                url: base_url.to_string(),
            })?;

        Ok(Self {
            base_url,
            company_name: company_name.into(),
        })
    }

    /// Homepage URL as a string.
    pub fn homepage(&self) -> &str {
        self.base_url.as_str()
    }

    /// Lower-cased host of the homepage.
    pub fn domain(&self) -> String {
        self.base_url.host_str().unwrap_or_default().to_string()
    }

    /// Filesystem and key-safe namespace derived from the company name.
    pub fn namespace(&self) -> String {
        company_slug(&self.company_name)
    }
}

/// Slug used to namespace cached pages per company.
pub fn company_slug(company_name: &str) -> String {
    let mut slug = String::with_capacity(company_name.len());
    let mut last_dash = true;
    for c in company_name.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_adds_scheme_and_normalizes() {
        let site = Site::new("Acme", "Example.COM/").unwrap();
        assert_eq!(site.homepage(), "https://example.com/");
        assert_eq!(site.domain(), "example.com");
    }

    #[test]
    fn test_site_rejects_garbage() {
        assert!(Site::new("Acme", "ftp://example.com").is_err());
        assert!(Site::new("Acme", "http://").is_err());
    }

    #[test]
    fn test_company_slug() {
        assert_eq!(company_slug("Acme Corp."), "acme-corp");
        assert_eq!(company_slug("  Café & Co "), "café-co");
        assert_eq!(company_slug("!!!"), "unnamed");
    }
}
