use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::config::{Config, SourceConfig};
use crate::db::Reconciler;
use crate::dedup::DedupAssigner;
use crate::extract::profile::ExtractionProfile;
use crate::extract::{detect_page_count, extract_candidates};
use crate::fetcher::PageFetcher;
use crate::normalize::normalize;
use crate::state::ScrapeStatus;
use crate::types::{now_ns, NormalizedEvent, ScrapeResult};

/// Fixed pauses between requests of one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pacing {
    pub page_delay: Duration,
    pub category_delay: Duration,
}

impl Pacing {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            page_delay: Duration::from_millis(cfg.page_delay_ms),
            category_delay: Duration::from_millis(cfg.category_delay_ms),
        }
    }
}

/// Runs the whole pipeline over the source table: fetch, extract, normalize,
/// dedup, reconcile. Runs are serialized; a run never fails as a whole.
pub struct ScrapeOrchestrator {
    sources: Vec<SourceConfig>,
    fetcher: Arc<dyn PageFetcher>,
    reconciler: Reconciler,
    status: Arc<ScrapeStatus>,
    health: Arc<HealthState>,
    pacing: Pacing,
    run_lock: Mutex<()>,
}

impl ScrapeOrchestrator {
    pub fn new(
        sources: Vec<SourceConfig>,
        fetcher: Arc<dyn PageFetcher>,
        reconciler: Reconciler,
        status: Arc<ScrapeStatus>,
        health: Arc<HealthState>,
        pacing: Pacing,
    ) -> Self {
        Self {
            sources,
            fetcher,
            reconciler,
            status,
            health,
            pacing,
            run_lock: Mutex::new(()),
        }
    }

    pub fn status(&self) -> &Arc<ScrapeStatus> {
        &self.status
    }

    /// Run now, waiting for any run already in progress to finish first.
    pub async fn run(&self) -> ScrapeResult {
        let _guard = self.run_lock.lock().await;
        self.run_locked().await
    }

    /// Run now unless another run holds the lock, in which case `None`.
    pub async fn try_run(&self) -> Option<ScrapeResult> {
        let _guard = self.run_lock.try_lock().ok()?;
        Some(self.run_locked().await)
    }

    async fn run_locked(&self) -> ScrapeResult {
        let started_at = now_ns();
        self.status.begin_run(started_at);
        self.health.set_scrape_running(true);
        info!(sources = self.sources.len(), "scrape run started");

        let mut counts: BTreeMap<String, usize> = self
            .sources
            .iter()
            .map(|s| (s.category.to_string(), 0))
            .collect();

        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 && !self.pacing.category_delay.is_zero() {
                tokio::time::sleep(self.pacing.category_delay).await;
            }
            let stored = self.scrape_source(source).await;
            let category = source.category.to_string();
            let entry = counts.entry(category.clone()).or_default();
            *entry += stored;
            self.status.set_category_count(&category, *entry);
            info!(
                category = %source.category,
                family = %source.family,
                stored,
                "source scraped"
            );
        }

        let result = ScrapeResult {
            total: counts.values().sum(),
            counts,
        };
        let finished_at = now_ns();
        self.status.finish_run(&result, finished_at);
        self.health.set_scrape_running(false);
        self.health.set_last_scrape_at_ns(finished_at);

        if result.total == 0 {
            warn!("scrape run stored no events; the source layout may have changed");
        }
        info!(
            total = result.total,
            elapsed_ms = (finished_at.saturating_sub(started_at)) / 1_000_000,
            "scrape run finished"
        );
        result
    }

    /// Scrape every page of one source and reconcile the result.
    /// Returns the number of events written.
    async fn scrape_source(&self, source: &SourceConfig) -> usize {
        let captured_at = now_ns();
        let mut assigner = DedupAssigner::new(source.category);
        let mut batch = Vec::new();

        let first_url = source.page_url(1);
        let first = match self.fetcher.fetch(&first_url).await {
            Ok(page) => page,
            Err(e) => {
                self.source_error(source, format!("{e}"));
                return 0;
            }
        };

        let page_count = if source.family.is_paginated() {
            let profile = ExtractionProfile::for_family(source.family);
            let advertised = detect_page_count(&first.html, &source.base_url, profile).unwrap_or(1);
            advertised.clamp(1, source.max_pages.max(1))
        } else {
            1
        };
        debug!(category = %source.category, page_count, "page count resolved");

        let mut pending = Some(first);
        for page_num in 1..=page_count {
            let page_url = source.page_url(page_num);
            let page = match pending.take() {
                Some(page) => page,
                None => {
                    if !self.pacing.page_delay.is_zero() {
                        tokio::time::sleep(self.pacing.page_delay).await;
                    }
                    match self.fetcher.fetch(&page_url).await {
                        Ok(page) => page,
                        Err(e) => {
                            self.source_error(source, format!("page {page_num}: {e}"));
                            break;
                        }
                    }
                }
            };

            let records = self.records_from_page(&page.html, &page_url, source);
            let offset = assigner.unique_count();
            let kept = assigner.assign(records, &source.base_url, offset);
            if kept.is_empty() {
                debug!(category = %source.category, page_num, "no new events, stopping pagination");
                break;
            }
            batch.extend(kept);
        }

        if batch.is_empty() {
            return 0;
        }
        let report = self.reconciler.apply(&batch, captured_at).await;
        if report.failed > 0 {
            warn!(
                category = %source.category,
                failed = report.failed,
                "some events could not be stored"
            );
        }
        report.touched()
    }

    fn records_from_page(
        &self,
        html: &str,
        page_url: &str,
        source: &SourceConfig,
    ) -> Vec<NormalizedEvent> {
        let candidates = match extract_candidates(html, page_url, source.category, source.family) {
            Ok(c) => c,
            Err(e) => {
                self.source_error(source, format!("extraction failed on {page_url}: {e}"));
                return Vec::new();
            }
        };

        let found = candidates.len();
        let mut rejected = 0usize;
        let records: Vec<NormalizedEvent> = candidates
            .iter()
            .filter_map(|raw| match normalize(raw, source.category, source.family) {
                Ok(ev) => Some(ev),
                Err(reason) => {
                    rejected += 1;
                    debug!(text = %raw.text, %reason, "candidate rejected");
                    None
                }
            })
            .collect();
        debug!(page_url, found, rejected, "page extracted");
        records
    }

    fn source_error(&self, source: &SourceConfig, message: String) {
        error!(category = %source.category, family = %source.family, "{message}");
        self.status
            .record_error(format!("{}/{}: {message}", source.family, source.category));
    }
}
