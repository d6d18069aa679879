//! Candidate links discovered on the homepage.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// File extensions that point at downloads rather than pages.
const DOWNLOAD_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".jpg", ".jpeg", ".png",
    ".gif", ".svg", ".webp", ".mp4", ".avi", ".mp3", ".exe", ".dmg", ".apk",
];

/// Query fragments that mark tracking or session parameters.
const TRACKING_QUERY_MARKERS: &[&str] = &["utm_", "session", "token"];

/// A link discovered on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Absolute, normalized URL
    pub url: String,

    /// Visible anchor text, whitespace-collapsed
    pub anchor_text: String,

    /// URL of the page the link was found on
    pub source_page: String,
}

impl Link {
    pub fn new(
        url: impl Into<String>,
        anchor_text: impl Into<String>,
        source_page: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            anchor_text: anchor_text.into(),
            source_page: source_page.into(),
        }
    }

    /// Lower-cased URL path, used by keyword matching.
    pub fn path(&self) -> String {
        Url::parse(&self.url)
            .map(|u| u.path().to_lowercase())
            .unwrap_or_default()
    }
}

/// Normalize a URL, resolving it against `base` when relative.
///
/// Scheme and host are lower-cased, the fragment is dropped, an empty query
/// is dropped and a trailing slash is stripped from non-root paths. Only
/// `http` and `https` URLs survive.
pub fn normalize_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut url = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    url.set_fragment(None);
    if url.query().is_some_and(|q| q.is_empty()) {
        url.set_query(None);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Some(url.to_string())
}

/// Host with any leading `www.` removed.
fn bare_host(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.trim_start_matches("www.").to_lowercase())
}

/// Turn a raw `href` into a candidate URL for the site, or reject it.
///
/// Rejects other hosts, downloads, and non-page schemes. Tracking and
/// session query strings are removed.
pub fn candidate_url(href: &str, page_url: &Url, site_url: &Url) -> Option<String> {
    let href = href.trim();
    let lower = href.to_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
    {
        return None;
    }

    let normalized = normalize_url(href, Some(page_url))?;
    let mut url = Url::parse(&normalized).ok()?;

    if bare_host(&url) != bare_host(site_url) {
        return None;
    }

    let path = url.path().to_lowercase();
    if DOWNLOAD_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return None;
    }

    if let Some(query) = url.query() {
        let query = query.to_lowercase();
        if TRACKING_QUERY_MARKERS.iter().any(|m| query.contains(m)) {
            url.set_query(None);
        }
    }

    Some(url.to_string())
}

/// Deduplicate links by URL, keeping first-seen order.
///
/// The first non-empty anchor text seen for a URL wins. Links pointing back
/// at `exclude` (usually the homepage itself) are dropped.
pub fn dedupe_links(links: impl IntoIterator<Item = Link>, exclude: Option<&str>) -> Vec<Link> {
    let mut seen: IndexMap<String, Link> = IndexMap::new();

    for link in links {
        if exclude == Some(link.url.as_str()) {
            continue;
        }
        match seen.get_mut(&link.url) {
            Some(existing) => {
                if existing.anchor_text.is_empty() && !link.anchor_text.is_empty() {
                    existing.anchor_text = link.anchor_text;
                }
            }
            None => {
                seen.insert(link.url.clone(), link);
            }
        }
    }

    seen.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn site() -> Url {
        Url::parse("https://www.example.com/").unwrap()
    }

    #[test]
    fn test_normalize_strips_fragment_and_slash() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM/About/#team", None).unwrap(),
            "https://example.com/About"
        );
        assert_eq!(
            normalize_url("https://example.com/", None).unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("https://example.com/jobs?", None).unwrap(),
            "https://example.com/jobs"
        );
        assert_eq!(
            normalize_url("https://example.com/jobs?team=eng", None).unwrap(),
            "https://example.com/jobs?team=eng"
        );
    }

    #[test]
    fn test_normalize_resolves_relative() {
        let base = Url::parse("https://example.com/company/").unwrap();
        assert_eq!(
            normalize_url("../careers/", Some(&base)).unwrap(),
            "https://example.com/careers"
        );
    }

    #[test]
    fn test_normalize_rejects_other_schemes() {
        assert!(normalize_url("ftp://example.com/file", None).is_none());
        assert!(normalize_url("", None).is_none());
    }

    #[test]
    fn test_candidate_filters() {
        let page = site();
        assert_eq!(
            candidate_url("/about", &page, &site()).unwrap(),
            "https://www.example.com/about"
        );
        assert_eq!(
            candidate_url("https://example.com/team", &page, &site()).unwrap(),
            "https://example.com/team"
        );
        assert!(candidate_url("https://other.com/about", &page, &site()).is_none());
        assert!(candidate_url("/brochure.PDF", &page, &site()).is_none());
        assert!(candidate_url("mailto:hi@example.com", &page, &site()).is_none());
        assert!(candidate_url("javascript:void(0)", &page, &site()).is_none());
        assert!(candidate_url("#top", &page, &site()).is_none());
    }

    #[test]
    fn test_candidate_drops_tracking_query() {
        let page = site();
        assert_eq!(
            candidate_url("/news?utm_source=x", &page, &site()).unwrap(),
            "https://www.example.com/news"
        );
        assert_eq!(
            candidate_url("/news?page=2", &page, &site()).unwrap(),
            "https://www.example.com/news?page=2"
        );
    }

    #[test]
    fn test_dedupe_keeps_first_and_fills_anchor() {
        let links = vec![
            Link::new("https://example.com/about", "", "https://example.com/"),
            Link::new("https://example.com/team", "Team", "https://example.com/"),
            Link::new("https://example.com/about", "About us", "https://example.com/"),
            Link::new("https://example.com/", "Home", "https://example.com/"),
        ];
        let deduped = dedupe_links(links, Some("https://example.com/"));
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].url, "https://example.com/about");
        assert_eq!(deduped[0].anchor_text, "About us");
        assert_eq!(deduped[1].url, "https://example.com/team");
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            path in "[a-z]{0,8}(/[a-z]{1,8}){0,3}/?",
            query in proptest::option::of("[a-z]{1,5}=[a-z0-9]{0,5}"),
            fragment in proptest::option::of("[a-z]{1,6}"),
        ) {
            let mut raw = format!("https://Example.com/{path}");
            if let Some(q) = &query {
                raw.push('?');
                raw.push_str(q);
            }
            if let Some(f) = &fragment {
                raw.push('#');
                raw.push_str(f);
            }

            let once = normalize_url(&raw, None).unwrap();
            let twice = normalize_url(&once, None).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert!(!once.contains('#'));
            prop_assert!(once.starts_with("https://example.com/"));
        }
    }
}
