//! Headless Chromium fetcher.
//!
//! Runs `chromium --headless --dump-dom` in a throwaway profile. The
//! virtual-time budget lets scripts and network settle before the DOM is
//! serialized; a hard timeout bounds the whole process.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{info, warn};
use url::Url;

use super::Fetcher;
use crate::config::AcquisitionConfig;
use crate::error::{FetchError, FetchResult};
use crate::html::extract_page;
use crate::types::fetch::{FetchedPage, Strategy};

/// Max concurrent Chromium processes. Each instance is heavy.
const MAX_CONCURRENT_CHROME: usize = 2;

/// Renders pages with a local headless Chromium.
pub struct ChromeFetcher {
    chrome_bin: String,
    user_agent: Option<String>,
    settle_budget: Duration,
    timeout: Duration,
    max_chars: usize,
    semaphore: Semaphore,
}

impl ChromeFetcher {
    /// Use the binary named by `CHROME_BIN`, defaulting to `chromium`.
    pub fn from_env() -> Self {
        let chrome_bin = std::env::var("CHROME_BIN").unwrap_or_else(|_| "chromium".to_string());
        Self::new(chrome_bin)
    }

    pub fn new(chrome_bin: impl Into<String>) -> Self {
        let chrome_bin = chrome_bin.into();
        info!(chrome_bin = %chrome_bin, max_concurrent = MAX_CONCURRENT_CHROME, "ChromeFetcher initialized");
        Self {
            chrome_bin,
            user_agent: None,
            settle_budget: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            max_chars: AcquisitionConfig::default().max_content_chars,
            semaphore: Semaphore::new(MAX_CONCURRENT_CHROME),
        }
    }

    /// Apply user agent and text limit from run configuration.
    pub fn with_config(mut self, config: &AcquisitionConfig) -> Self {
        self.user_agent = Some(config.user_agent.clone());
        self.max_chars = config.max_content_chars;
        self
    }

    /// Virtual time given to scripts before the DOM is dumped (default 2s).
    pub fn with_settle_budget(mut self, budget: Duration) -> Self {
        self.settle_budget = budget;
        self
    }

    /// Hard limit on the Chromium process (default 30s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn dump_dom(&self, url: &str) -> FetchResult<Vec<u8>> {
        let profile = tempfile::tempdir()
            .map_err(|e| FetchError::render(url, format!("temp profile: {e}")))?;

        let mut args = vec![
            "--headless".to_string(),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--user-data-dir={}", profile.path().display()),
            format!("--virtual-time-budget={}", self.settle_budget.as_millis()),
        ];
        if let Some(agent) = &self.user_agent {
            args.push(format!("--user-agent={agent}"));
        }
        args.push("--dump-dom".to_string());
        args.push(url.to_string());

        let child = Command::new(&self.chrome_bin)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(FetchError::render(url, format!("failed to launch {}: {e}", self.chrome_bin)))
            }
            Err(_) => {
                return Err(FetchError::render(
                    url,
                    format!("timed out after {}s", self.timeout.as_secs()),
                ))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(url = %url, stderr = %stderr, "Chrome exited with error");
            return Err(FetchError::render(url, format!("exit status {}", output.status)));
        }

        if output.stdout.is_empty() {
            return Err(FetchError::render(url, "empty DOM output"));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Fetcher for ChromeFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl { url: url.to_string() })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl { url: url.to_string() });
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::render(url, "renderer shut down"))?;

        info!(url = %url, fetcher = "chrome", "rendering page");
        let dom = self.dump_dom(url).await?;
        let html = String::from_utf8_lossy(&dom);

        let content = extract_page(&html, &parsed, self.max_chars);
        info!(url = %url, fetcher = "chrome", chars = content.text_chars(), "render complete");

        Ok(FetchedPage {
            content,
            strategy: Strategy::Rendered,
        })
    }

    fn strategy(&self) -> Strategy {
        Strategy::Rendered
    }

    fn name(&self) -> &'static str {
        "chrome"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;

    #[tokio::test]
    async fn test_missing_binary_is_render_error() {
        let fetcher = ChromeFetcher::new("/nonexistent/chromium-binary");
        let err = fetcher.fetch("https://example.com/").await.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Render);
    }

    #[tokio::test]
    async fn test_rejects_non_http() {
        let fetcher = ChromeFetcher::new("chromium");
        let err = fetcher.fetch("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }
}
