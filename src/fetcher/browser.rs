use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{with_retry, AttemptError, FetchPolicy, FetchedPage, PageFetcher, RequestGap};
use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::{AppError, Result};

/// Buttons that close a cookie or consent overlay, tried in order.
const CONSENT_BUTTONS: [&str; 5] = [
    "button#onetrust-accept-btn-handler",
    r#"button[id*="accept"]"#,
    ".onetrust-close-btn-handler",
    r#"[aria-label*="accept"]"#,
    r#"[aria-label*="Accept"]"#,
];

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";
const READY_POLL: Duration = Duration::from_millis(250);
const CONSENT_SETTLE: Duration = Duration::from_millis(500);

/// What the browser does to a page between navigation and snapshot.
#[derive(Debug, Clone)]
pub struct RenderSteps {
    /// Rendering counts as done once this selector matches.
    pub ready_selector: String,
    pub ready_timeout: Duration,
    /// Scrolls to the bottom to trigger lazily loaded rows.
    pub scrolls: u32,
    pub scroll_pause: Duration,
}

impl Default for RenderSteps {
    fn default() -> Self {
        Self {
            ready_selector: "body a[href]".to_string(),
            ready_timeout: Duration::from_secs(3),
            scrolls: 3,
            scroll_pause: Duration::from_millis(800),
        }
    }
}

/// Renders pages in headless Chromium over the DevTools protocol, so
/// client-side listings are in the markup handed to the extractor.
pub struct BrowserFetcher {
    browser: Browser,
    handler: JoinHandle<()>,
    policy: FetchPolicy,
    steps: RenderSteps,
    gap: RequestGap,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl BrowserFetcher {
    pub async fn launch(
        policy: FetchPolicy,
        steps: RenderSteps,
        chrome_path: Option<&str>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .request_timeout(policy.timeout)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", policy.user_agent));
        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(AppError::Browser)?;

        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| AppError::Browser(e.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    warn!("browser connection closed: {e}");
                    break;
                }
            }
        });
        info!(chrome_path = chrome_path.unwrap_or("auto"), "headless browser launched");

        Ok(Self {
            browser,
            handler,
            gap: RequestGap::new(policy.min_gap),
            policy,
            steps,
            health,
            latency,
        })
    }

    async fn attempt(&self, url: &str) -> std::result::Result<FetchedPage, AttemptError> {
        self.gap.wait().await;
        let started = Instant::now();

        let timeout = self.policy.timeout;
        let page = tokio::time::timeout(timeout, self.browser.new_page(url))
            .await
            .map_err(|_| AttemptError::retryable(format!("navigation timed out after {timeout:?}")))?
            .map_err(|e| AttemptError::retryable(e.to_string()))?;

        let rendered = self.render(&page, url).await;
        if let Err(e) = page.close().await {
            debug!(url, "closing page failed: {e}");
        }
        let page = rendered?;
        self.latency.record(started.elapsed());
        Ok(page)
    }

    async fn render(&self, page: &Page, url: &str) -> std::result::Result<FetchedPage, AttemptError> {
        page.wait_for_navigation()
            .await
            .map_err(|e| AttemptError::retryable(e.to_string()))?;

        let deadline = Instant::now() + self.steps.ready_timeout;
        if !wait_for_selector(page, &self.steps.ready_selector, deadline).await {
            debug!(url, selector = %self.steps.ready_selector, "ready selector never matched");
        }
        if let Some(selector) = dismiss_consent(page).await {
            debug!(url, selector, "consent dialog dismissed");
        }
        for _ in 0..self.steps.scrolls {
            page.evaluate(SCROLL_TO_BOTTOM)
                .await
                .map_err(|e| AttemptError::retryable(e.to_string()))?;
            tokio::time::sleep(self.steps.scroll_pause).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| AttemptError::retryable(e.to_string()))?;
        let final_url = page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());
        Ok(FetchedPage {
            url: final_url,
            html,
        })
    }
}

impl Drop for BrowserFetcher {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        with_retry(&self.policy, &self.health, url, || self.attempt(url)).await
    }
}

/// Polls until `selector` matches or the deadline passes.
async fn wait_for_selector(page: &Page, selector: &str, deadline: Instant) -> bool {
    loop {
        if page.find_element(selector).await.is_ok() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(READY_POLL).await;
    }
}

/// Clicks the first consent button present. Returns the selector that hit.
async fn dismiss_consent(page: &Page) -> Option<&'static str> {
    for selector in CONSENT_BUTTONS {
        let Ok(button) = page.find_element(selector).await else {
            continue;
        };
        if button.click().await.is_ok() {
            tokio::time::sleep(CONSENT_SETTLE).await;
            return Some(selector);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_buttons_are_valid_css() {
        for selector in CONSENT_BUTTONS {
            assert!(scraper::Selector::parse(selector).is_ok(), "{selector}");
        }
        assert!(scraper::Selector::parse(&RenderSteps::default().ready_selector).is_ok());
    }
}
