//! Robots.txt parser and loader.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Parsed robots.txt rules.
#[derive(Debug, Clone, Default)]
pub struct RobotsTxt {
    /// Rules per user-agent token (lowercase)
    rules: HashMap<String, AgentRules>,

    /// Default rules (for *)
    default_rules: AgentRules,

    /// Sitemaps listed
    sitemaps: Vec<String>,
}

/// A path pattern. `*` matches any sequence, a trailing `$` anchors the end.
#[derive(Debug, Clone)]
struct PathRule {
    raw: String,
    matcher: Option<Regex>,
}

impl PathRule {
    fn new(raw: &str) -> Self {
        let matcher = if raw.contains('*') || raw.ends_with('$') {
            let (body, anchored) = match raw.strip_suffix('$') {
                Some(body) => (body, true),
                None => (raw, false),
            };
            let mut pattern = String::from("^");
            pattern.push_str(
                &body
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*"),
            );
            if anchored {
                pattern.push('$');
            }
            Regex::new(&pattern).ok()
        } else {
            None
        };
        Self {
            raw: raw.to_string(),
            matcher,
        }
    }

    fn matches(&self, path: &str) -> bool {
        match &self.matcher {
            Some(re) => re.is_match(path),
            None => path.starts_with(&self.raw),
        }
    }

    /// Precedence weight.
    fn len(&self) -> usize {
        self.raw.len()
    }
}

/// Rules for one user-agent group.
#[derive(Debug, Clone, Default)]
pub struct AgentRules {
    disallow: Vec<PathRule>,
    allow: Vec<PathRule>,

    /// Crawl delay for this agent, in seconds
    crawl_delay: Option<f64>,
}

impl RobotsTxt {
    /// Parse robots.txt content. Unknown or malformed lines are ignored.
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules = AgentRules::default();
        // Consecutive user-agent lines share one group
        let mut in_rules = false;

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if in_rules {
                        robots.store_group(&current_agents, &current_rules);
                        current_agents.clear();
                        current_rules = AgentRules::default();
                        in_rules = false;
                    }
                    if !value.is_empty() {
                        current_agents.push(value.to_lowercase());
                    }
                }
                "disallow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current_rules.disallow.push(PathRule::new(value));
                    }
                }
                "allow" => {
                    in_rules = true;
                    if !value.is_empty() {
                        current_rules.allow.push(PathRule::new(value));
                    }
                }
                "crawl-delay" => {
                    in_rules = true;
                    if let Ok(delay) = value.parse::<f64>() {
                        if delay.is_finite() && delay >= 0.0 {
                            current_rules.crawl_delay = Some(delay);
                        }
                    }
                }
                "sitemap" => {
                    robots.sitemaps.push(value.to_string());
                }
                _ => {}
            }
        }

        robots.store_group(&current_agents, &current_rules);
        robots
    }

    fn store_group(&mut self, agents: &[String], rules: &AgentRules) {
        for agent in agents {
            if agent == "*" {
                self.default_rules = rules.clone();
            } else {
                self.rules.insert(agent.clone(), rules.clone());
            }
        }
    }

    /// Rules matching a user agent, by product token.
    fn rules_for(&self, user_agent: &str) -> &AgentRules {
        let token = product_token(user_agent);
        self.rules
            .get(&token)
            .or_else(|| {
                self.rules
                    .iter()
                    .find(|(k, _)| token.contains(k.as_str()))
                    .map(|(_, v)| v)
            })
            .unwrap_or(&self.default_rules)
    }

    /// Check if a path is allowed for a user-agent.
    ///
    /// The longest matching rule wins; on a tie, allow wins.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        let rules = self.rules_for(user_agent);

        let longest = |patterns: &[PathRule]| {
            patterns
                .iter()
                .filter(|p| p.matches(path))
                .map(PathRule::len)
                .max()
        };

        match (longest(&rules.allow), longest(&rules.disallow)) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(allow), Some(disallow)) => allow >= disallow,
        }
    }

    /// Crawl delay for a user-agent, falling back to the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.rules_for(user_agent)
            .crawl_delay
            .or(self.default_rules.crawl_delay)
            .map(Duration::from_secs_f64)
    }

    /// Get listed sitemaps.
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Check if robots.txt disallows all crawling.
    pub fn disallows_all(&self, user_agent: &str) -> bool {
        !self.is_allowed(user_agent, "/")
    }
}

/// `BrochureAI/0.1 (+x)` -> `brochureai`
fn product_token(user_agent: &str) -> String {
    user_agent
        .split(['/', ' '])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Where crawl-exclusion rules come from.
///
/// Implementations must be fail-open: any failure yields an allow-all rule set.
#[async_trait]
pub trait RobotsSource: Send + Sync {
    async fn load(&self, origin: &Url) -> RobotsTxt;
}

/// Loads `/robots.txt` over HTTP.
pub struct HttpRobotsSource {
    client: reqwest::Client,
}

impl HttpRobotsSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RobotsSource for HttpRobotsSource {
    async fn load(&self, origin: &Url) -> RobotsTxt {
        let Ok(url) = origin.join("/robots.txt") else {
            return RobotsTxt::default();
        };

        match self.client.get(url.as_str()).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    debug!(url = %url, "loaded robots.txt");
                    RobotsTxt::parse(&body)
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "unreadable robots.txt, allowing all");
                    RobotsTxt::default()
                }
            },
            Ok(response) => {
                debug!(url = %url, status = %response.status(), "no robots.txt, allowing all");
                RobotsTxt::default()
            }
            Err(e) => {
                warn!(url = %url, error = %e, "robots.txt unreachable, allowing all");
                RobotsTxt::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_basic() {
        let content = r#"
User-agent: *
Disallow: /private/
Disallow: /admin/
Allow: /public/
Crawl-delay: 2

Sitemap: https://example.com/sitemap.xml
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(robots.is_allowed("BrochureAI/0.1", "/public/page"));
        assert!(!robots.is_allowed("BrochureAI/0.1", "/private/page"));
        assert!(!robots.is_allowed("BrochureAI/0.1", "/admin/"));
        assert!(robots.is_allowed("BrochureAI/0.1", "/about"));

        assert_eq!(
            robots.crawl_delay("BrochureAI/0.1"),
            Some(Duration::from_secs(2))
        );
        assert_eq!(robots.sitemaps().len(), 1);
    }

    #[test]
    fn test_specific_user_agent() {
        let content = r#"
User-agent: *
Disallow: /

User-agent: brochureai
Disallow:
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("OtherBot/2.0", "/about"));
        assert!(robots.is_allowed("BrochureAI/0.1 (+acquisition)", "/about"));
    }

    #[test]
    fn test_grouped_user_agents_share_rules() {
        let content = r#"
User-agent: brochureai
User-agent: otherbot
Disallow: /careers
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("BrochureAI/0.1", "/careers"));
        assert!(!robots.is_allowed("OtherBot", "/careers"));
        assert!(robots.is_allowed("ThirdBot", "/careers"));
    }

    #[test]
    fn test_longest_match_wins() {
        let content = r#"
User-agent: *
Disallow: /company/
Allow: /company/about
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("Bot", "/company/legal"));
        assert!(robots.is_allowed("Bot", "/company/about-us"));
    }

    #[test]
    fn test_wildcard_and_end_anchor() {
        let content = r#"
User-agent: *
Disallow: /*/private
Disallow: /*.pdf$
Allow: /en/private/press
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("BrochureAI/0.1", "/en/private/team"));
        assert!(robots.is_allowed("BrochureAI/0.1", "/en/private/press-kit"));
        assert!(!robots.is_allowed("BrochureAI/0.1", "/files/report.pdf"));
        assert!(robots.is_allowed("BrochureAI/0.1", "/files/report.pdf.html"));
        assert!(robots.is_allowed("BrochureAI/0.1", "/private"));
    }

    #[test]
    fn test_literal_rule_chars_are_not_regex() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: /a.b(c)\n");
        assert!(!robots.is_allowed("Bot", "/a.b(c)/page"));
        assert!(robots.is_allowed("Bot", "/axb(c)"));

        let anchored = RobotsTxt::parse("User-agent: *\nDisallow: /a.b$\n");
        assert!(!anchored.is_allowed("Bot", "/a.b"));
        assert!(anchored.is_allowed("Bot", "/axb"));
        assert!(anchored.is_allowed("Bot", "/a.b/more"));
    }

    #[test]
    fn test_empty_user_agent_line_is_ignored() {
        let robots = RobotsTxt::parse("User-agent:\nDisallow:\n\nUser-agent: *\nDisallow: /about\n");
        assert!(!robots.is_allowed("BrochureAI/0.1", "/about"));
        assert!(robots.is_allowed("BrochureAI/0.1", "/team"));
    }

    #[test]
    fn test_empty_and_garbage_allow_all() {
        assert!(RobotsTxt::parse("").is_allowed("Bot", "/any/path"));
        let garbage = RobotsTxt::parse("<html>not robots</html>\n\u{0}\u{1}");
        assert!(garbage.is_allowed("Bot", "/any/path"));
        assert!(garbage.crawl_delay("Bot").is_none());
    }

    #[test]
    fn test_disallow_all() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: / # everything\n");
        assert!(robots.disallows_all("Bot"));
    }

    #[tokio::test]
    async fn test_http_source_reads_rules() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /legal"))
            .mount(&server)
            .await;

        let source = HttpRobotsSource::new(reqwest::Client::new());
        let robots = source.load(&Url::parse(&server.uri()).unwrap()).await;

        assert!(!robots.is_allowed("BrochureAI", "/legal"));
        assert!(robots.is_allowed("BrochureAI", "/about"));
    }

    #[tokio::test]
    async fn test_http_source_fails_open() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = HttpRobotsSource::new(reqwest::Client::new());
        let robots = source.load(&Url::parse(&server.uri()).unwrap()).await;
        assert!(robots.is_allowed("BrochureAI", "/anything"));

        // Nothing listening on this port
        let unreachable = source
            .load(&Url::parse("http://127.0.0.1:9/").unwrap())
            .await;
        assert!(unreachable.is_allowed("BrochureAI", "/anything"));
    }
}
