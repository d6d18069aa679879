//! HTML to visible text and links.
//!
//! Shared by every fetch strategy so static and rendered pages come out in
//! the same shape.

use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::types::fetch::{PageContent, PageSignals};
use crate::types::link::{candidate_url, dedupe_links, normalize_url, Link};

/// Elements whose content never reaches the extracted text.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "template", "svg", "head", "header", "footer", "nav",
    "aside", "form", "button", "input", "select", "textarea",
];

/// Elements that start a new line of text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5",
    "h6", "br", "tr", "td", "th", "table", "blockquote", "pre", "dd", "dt", "figcaption",
];

/// Phrases shown by pages that need JavaScript to display anything.
const JAVASCRIPT_NOTICES: &[&str] = &[
    "please enable javascript",
    "requires javascript",
    "javascript is disabled",
    "enable javascript to run this app",
    "loading...",
    "cargando...",
];

/// Pages with more visible text than this are never treated as a notice page.
const NOTICE_PAGE_MAX_CHARS: usize = 1000;

/// Mount points shorter than this count as an empty app shell.
const APP_SHELL_MIN_CHARS: usize = 50;

pub const TRUNCATION_MARKER: &str = "[Content truncated]";

/// Parse an HTML document into text, title, links and render signals.
///
/// Text is truncated to `max_chars`.
pub fn extract_page(html: &str, page_url: &Url, max_chars: usize) -> PageContent {
    let document = Html::parse_document(html);

    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);
    let text = clean_text(&raw);

    let signals = page_signals(&document, html, &text);
    let links = extract_links(&document, page_url);

    let mut page = PageContent::new(page_url.as_str(), truncate_text(&text, max_chars))
        .with_links(links)
        .with_signals(signals);

    if let Some(title) = extract_title(&document) {
        page = page.with_title(title);
    }

    page
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Collapse whitespace per line, drop blank lines and immediate repeats.
pub fn clean_text(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            continue;
        }
        if lines.last() == Some(&collapsed) {
            continue;
        }
        lines.push(collapsed);
    }

    lines.join("\n")
}

/// Truncate to `max_chars`, preferring to cut at a line boundary.
///
/// The cut moves back to the last newline only when that keeps at least
/// 90% of the allowed length.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut: String = text.chars().take(max_chars).collect();
    let cut = match cut.rfind('\n') {
        Some(idx) if cut[..idx].chars().count() * 10 > max_chars * 9 => cut[..idx].to_string(),
        _ => cut,
    };

    format!("{}\n\n{}", cut.trim_end(), TRUNCATION_MARKER)
}

fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())
    })
}

/// Same-site links with anchor text, deduplicated in document order.
fn extract_links(document: &Html, page_url: &Url) -> Vec<Link> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let links = document.select(&selector).filter_map(|el| {
        let href = el.value().attr("href")?;
        let url = candidate_url(href, page_url, page_url)?;
        Some(Link::new(url, anchor_text(el), page_url.as_str()))
    });

    let own = normalize_url(page_url.as_str(), None);
    dedupe_links(links, own.as_deref())
}

fn anchor_text(el: ElementRef<'_>) -> String {
    let text = el.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        return text;
    }

    el.value()
        .attr("aria-label")
        .or_else(|| el.value().attr("title"))
        .map(|s| s.trim().to_string())
        .or_else(|| {
            let img = Selector::parse("img[alt]").ok()?;
            el.select(&img)
                .next()
                .and_then(|i| i.value().attr("alt"))
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_default()
}

fn page_signals(document: &Html, html: &str, text: &str) -> PageSignals {
    let count = |s: &str| {
        Selector::parse(s)
            .map(|sel| document.select(&sel).count())
            .unwrap_or(0)
    };

    let empty_app_shell = Selector::parse("div#root, div#app")
        .map(|sel| {
            document.select(&sel).any(|el| {
                let inner: String = el.text().collect();
                inner.trim().chars().count() < APP_SHELL_MIN_CHARS
            })
        })
        .unwrap_or(false);

    let javascript_notice = text.chars().count() < NOTICE_PAGE_MAX_CHARS && {
        let lower = text.to_lowercase();
        JAVASCRIPT_NOTICES.iter().any(|n| lower.contains(n))
    };

    PageSignals {
        html_len: html.len(),
        script_count: count("script"),
        link_count: count("a[href]"),
        empty_app_shell,
        javascript_notice,
    }
}
