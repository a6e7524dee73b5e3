use std::time::Duration;

use crate::error::{AppError, Result};
use crate::fetcher::FetchMode;
use crate::types::{Category, SourceFamily};

pub const EXCHANGE_BASE_URL: &str = "https://www.betfair.com/exchange/plus/en";
pub const SPORTSBOOK_BASE_URL: &str = "https://www.betfair.com/sport";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Delay before the first scheduled scrape, so the API is up before the
/// first long run starts.
pub const INITIAL_SCRAPE_DELAY_SECS: u64 = 5;

/// Minimum gap between two requests issued by one fetcher.
pub const MIN_REQUEST_GAP_MS: u64 = 250;

/// Freshness labels (minutes since the newest capture).
pub mod freshness_thresholds {
    pub const FRESH_MAX_MINUTES: f64 = 15.0;
    pub const MODERATE_MAX_MINUTES: f64 = 30.0;
}

/// Content ingestion caps per source.
pub const CONTENT_MAX_ARTICLES: usize = 15;
pub const CONTENT_MAX_POSTS: usize = 20;
/// Content items not seen again within a week are dropped.
pub const CONTENT_RETENTION_HOURS: u64 = 7 * 24;

/// One configured scrape target.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub category: Category,
    pub family: SourceFamily,
    pub base_url: String,
    /// Page-count ceiling; only consulted for paginated families.
    pub max_pages: u32,
}

impl SourceConfig {
    /// URL of the n-th listing page (1-based). Page 1 is the base URL itself.
    pub fn page_url(&self, page_num: u32) -> String {
        if page_num <= 1 {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), page_num)
        }
    }
}

/// The static source table for the requested families, in scrape order.
pub fn default_sources(families: &[SourceFamily]) -> Vec<SourceConfig> {
    let mut sources = Vec::new();
    for family in families {
        match family {
            SourceFamily::Exchange => {
                let table: [(Category, &str, u32); 6] = [
                    (Category::Football, "football-betting-1", 30),
                    (Category::Tennis, "tennis-betting-2", 10),
                    (Category::Basketball, "basketball-betting-10", 5),
                    (Category::HorseRacing, "horse-racing-betting-7", 10),
                    (Category::Cricket, "cricket-betting-4", 5),
                    (Category::Golf, "golf-betting-3", 3),
                ];
                for (category, path, max_pages) in table {
                    sources.push(SourceConfig {
                        category,
                        family: *family,
                        base_url: format!("{EXCHANGE_BASE_URL}/{path}"),
                        max_pages,
                    });
                }
            }
            SourceFamily::Sportsbook => {
                for category in Category::ALL {
                    sources.push(SourceConfig {
                        category,
                        family: *family,
                        base_url: format!("{SPORTSBOOK_BASE_URL}/{category}"),
                        max_pages: 1,
                    });
                }
            }
        }
    }
    sources
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub user_agent: String,
    /// Scheduled scrape interval (SCRAPE_INTERVAL_MINUTES)
    pub scrape_interval_minutes: u64,
    /// Per-request timeout (PAGE_TIMEOUT_SECS)
    pub page_timeout_secs: u64,
    /// Pause between listing pages of one category (PAGE_DELAY_MS)
    pub page_delay_ms: u64,
    /// Pause between categories (CATEGORY_DELAY_MS)
    pub category_delay_ms: u64,
    /// Retries after the first failed attempt (FETCH_MAX_RETRIES)
    pub fetch_max_retries: u32,
    /// Base of the exponential retry backoff (RETRY_BASE_MS)
    pub retry_base_ms: u64,
    /// Events not captured within this many hours are purged (RETENTION_HOURS)
    pub retention_hours: u64,
    /// Content ingestion pool size (CONTENT_WORKERS)
    pub content_workers: usize,
    /// Content ingestion interval (CONTENT_INTERVAL_MINUTES)
    pub content_interval_minutes: u64,
    /// Data older than this is considered stale (STALE_AFTER_MINUTES)
    pub stale_after_minutes: f64,
    /// Source families to scrape (SOURCE_FAMILIES, comma-separated).
    /// Example: "exchange,sportsbook"
    pub source_families: Vec<SourceFamily>,
    /// Page fetcher: "browser" (default) or "http" (FETCH_MODE)
    pub fetch_mode: FetchMode,
    /// Chromium binary; auto-detected when unset (CHROME_PATH)
    pub chrome_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let source_families = std::env::var("SOURCE_FAMILIES")
            .unwrap_or_else(|_| "exchange".to_string())
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                SourceFamily::parse(s).ok_or_else(|| {
                    AppError::Config(format!(
                        "SOURCE_FAMILIES contains unknown family '{s}' (expected exchange or sportsbook)"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if source_families.is_empty() {
            return Err(AppError::Config(
                "SOURCE_FAMILIES must name at least one family".to_string(),
            ));
        }

        let fetch_mode = match std::env::var("FETCH_MODE") {
            Ok(raw) if !raw.trim().is_empty() => FetchMode::parse(&raw).ok_or_else(|| {
                AppError::Config(format!(
                    "FETCH_MODE has an invalid value: '{raw}' (expected browser or http)"
                ))
            })?,
            _ => FetchMode::Browser,
        };

        let content_workers = env_parse::<usize>("CONTENT_WORKERS", 3)?;
        if content_workers == 0 {
            return Err(AppError::Config("CONTENT_WORKERS must be at least 1".to_string()));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "scanner.db".to_string()),
            api_port: env_parse::<u16>("API_PORT", 3001)?,
            user_agent: std::env::var("USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            scrape_interval_minutes: env_parse::<u64>("SCRAPE_INTERVAL_MINUTES", 15)?.max(1),
            page_timeout_secs: env_parse::<u64>("PAGE_TIMEOUT_SECS", 20)?,
            page_delay_ms: env_parse::<u64>("PAGE_DELAY_MS", 1000)?,
            category_delay_ms: env_parse::<u64>("CATEGORY_DELAY_MS", 2000)?,
            fetch_max_retries: env_parse::<u32>("FETCH_MAX_RETRIES", 2)?,
            retry_base_ms: env_parse::<u64>("RETRY_BASE_MS", 500)?,
            retention_hours: env_parse::<u64>("RETENTION_HOURS", 24)?,
            content_workers,
            content_interval_minutes: env_parse::<u64>("CONTENT_INTERVAL_MINUTES", 30)?.max(1),
            stale_after_minutes: env_parse::<f64>("STALE_AFTER_MINUTES", 30.0)?,
            source_families,
            fetch_mode,
            chrome_path: std::env::var("CHROME_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
        })
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: '{raw}'"))),
        _ => Ok(default),
    }
}
