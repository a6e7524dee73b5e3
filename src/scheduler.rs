use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::{Config, INITIAL_SCRAPE_DELAY_SECS};
use crate::content::ContentIngestor;
use crate::db::queries::purge_older_than;
use crate::orchestrator::ScrapeOrchestrator;
use crate::types::now_ns;

/// Periodic odds scrape followed by the retention purge.
pub struct ScrapeScheduler {
    orchestrator: Arc<ScrapeOrchestrator>,
    pool: SqlitePool,
    every: Duration,
    retention_hours: u64,
}

impl ScrapeScheduler {
    pub fn new(cfg: &Config, orchestrator: Arc<ScrapeOrchestrator>, pool: SqlitePool) -> Self {
        Self {
            orchestrator,
            pool,
            every: Duration::from_secs(cfg.scrape_interval_minutes * 60),
            retention_hours: cfg.retention_hours,
        }
    }

    pub async fn run(self) {
        tokio::time::sleep(Duration::from_secs(INITIAL_SCRAPE_DELAY_SECS)).await;

        // Startup scrape waits out a manual trigger instead of skipping.
        let result = self.orchestrator.run().await;
        info!(total = result.total, "startup scrape finished");
        self.purge().await;

        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // skip immediate first tick, startup scrape just ran

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        match self.orchestrator.try_run().await {
            Some(result) => info!(total = result.total, "scheduled scrape finished"),
            None => {
                warn!("previous scrape still running, skipping this tick");
                return;
            }
        }
        self.purge().await;
    }

    async fn purge(&self) {
        match purge_older_than(&self.pool, self.retention_hours, now_ns()).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, retention_hours = self.retention_hours, "purged old events"),
            Err(e) => error!("Retention purge failed: {e}"),
        }
    }
}

/// Content ingestion on its own interval.
pub struct ContentScheduler {
    ingestor: ContentIngestor,
    every: Duration,
}

impl ContentScheduler {
    pub fn new(cfg: &Config, ingestor: ContentIngestor) -> Self {
        Self {
            ingestor,
            every: Duration::from_secs(cfg.content_interval_minutes * 60),
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // odds go first; content waits a full interval

        loop {
            ticker.tick().await;
            if let Err(e) = self.ingestor.run().await {
                error!("Content ingestion failed: {e}");
            }
        }
    }
}
