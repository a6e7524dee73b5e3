mod browser;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::{Config, MIN_REQUEST_GAP_MS};
use crate::error::{AppError, Result};

pub use browser::{BrowserFetcher, RenderSteps};

/// Upper bound of the random jitter added to each retry backoff.
const MAX_JITTER_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub html: String,
}

/// Anything that can turn a URL into page markup. The orchestrator and the
/// content workers only see this trait, so tests swap in canned pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub retry_base: Duration,
    pub min_gap: Duration,
    pub user_agent: String,
}

impl FetchPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            timeout: cfg.page_timeout(),
            max_retries: cfg.fetch_max_retries,
            retry_base: Duration::from_millis(cfg.retry_base_ms),
            min_gap: Duration::from_millis(MIN_REQUEST_GAP_MS),
            user_agent: cfg.user_agent.clone(),
        }
    }
}

/// Which `PageFetcher` drives the odds and content scrapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Headless Chromium; pages are rendered before extraction.
    Browser,
    /// Plain HTTP GET of the served markup.
    Http,
}

impl FetchMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" | "chrome" | "chromium" => Some(FetchMode::Browser),
            "http" => Some(FetchMode::Http),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FetchMode::Browser => "browser",
            FetchMode::Http => "http",
        }
    }
}

/// Builds the fetcher for `mode`. A browser that fails to launch degrades to
/// the HTTP fetcher; the returned mode is the one actually in use.
pub async fn build_fetcher(
    mode: FetchMode,
    chrome_path: Option<&str>,
    policy: &FetchPolicy,
    health: &Arc<HealthState>,
    latency: &Arc<LatencyStats>,
) -> Result<(Arc<dyn PageFetcher>, FetchMode)> {
    if mode == FetchMode::Browser {
        match BrowserFetcher::launch(
            policy.clone(),
            RenderSteps::default(),
            chrome_path,
            Arc::clone(health),
            Arc::clone(latency),
        )
        .await
        {
            Ok(browser) => return Ok((Arc::new(browser), FetchMode::Browser)),
            Err(e) => warn!("headless browser unavailable, falling back to HTTP: {e}"),
        }
    }
    let http = HttpFetcher::new(policy.clone(), Arc::clone(health), Arc::clone(latency))?;
    Ok((Arc::new(http), FetchMode::Http))
}

/// Enforces a minimum gap between consecutive requests of one fetcher.
struct RequestGap {
    min_gap: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestGap {
    fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.min_gap {
                tokio::time::sleep(self.min_gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// reqwest-backed fetcher with a minimum gap between requests and bounded
/// retry (exponential backoff plus jitter).
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: FetchPolicy,
    gap: RequestGap,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl HttpFetcher {
    pub fn new(
        policy: FetchPolicy,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(policy.timeout)
            .user_agent(policy.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            gap: RequestGap::new(policy.min_gap),
            policy,
            health,
            latency,
        })
    }

    async fn attempt(&self, url: &str) -> std::result::Result<FetchedPage, AttemptError> {
        self.gap.wait().await;
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::retryable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {status}");
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                AttemptError::retryable(reason)
            } else {
                AttemptError::fatal(reason)
            });
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| AttemptError::retryable(e.to_string()))?;
        self.latency.record(started.elapsed());

        Ok(FetchedPage {
            url: final_url,
            html,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        with_retry(&self.policy, &self.health, url, || self.attempt(url)).await
    }
}

/// Drives `attempt` until it succeeds, fails fatally, or runs out of
/// retries. Health counters are updated here for every fetcher.
async fn with_retry<F, Fut>(
    policy: &FetchPolicy,
    health: &HealthState,
    url: &str,
    mut attempt: F,
) -> Result<FetchedPage>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<FetchedPage, AttemptError>>,
{
    let mut tries = 0u32;
    loop {
        match attempt().await {
            Ok(page) => {
                health.inc_fetch_ok();
                debug!(url, bytes = page.html.len(), "fetched page");
                return Ok(page);
            }
            Err(e) if e.retryable && tries < policy.max_retries => {
                let jitter = rand::thread_rng().gen_range(0..=MAX_JITTER_MS);
                let delay = backoff_delay(policy.retry_base, tries, jitter);
                warn!(
                    url,
                    attempt = tries + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "fetch failed ({}), retrying",
                    e.reason
                );
                health.inc_fetch_retries();
                tokio::time::sleep(delay).await;
                tries += 1;
            }
            Err(e) => {
                health.inc_fetch_failed();
                return Err(AppError::Fetch {
                    url: url.to_string(),
                    reason: e.reason,
                });
            }
        }
    }
}

#[derive(Debug)]
struct AttemptError {
    reason: String,
    retryable: bool,
}

impl AttemptError {
    fn retryable(reason: String) -> Self {
        Self {
            reason,
            retryable: true,
        }
    }

    fn fatal(reason: String) -> Self {
        Self {
            reason,
            retryable: false,
        }
    }
}

/// `base * 2^attempt + jitter`. The exponent is capped so long retry chains
/// cannot overflow.
pub fn backoff_delay(base: Duration, attempt: u32, jitter_ms: u64) -> Duration {
    base.saturating_mul(1u32 << attempt.min(10)) + Duration::from_millis(jitter_ms)
}
