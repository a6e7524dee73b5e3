mod api;
mod config;
mod content;
mod db;
mod dedup;
mod error;
mod extract;
mod fetcher;
mod normalize;
mod orchestrator;
mod scheduler;
mod state;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::{default_sources, Config};
use crate::content::{ContentIngestor, CONTENT_SOURCES};
use crate::db::Reconciler;
use crate::error::Result;
use crate::fetcher::{build_fetcher, FetchPolicy, PageFetcher};
use crate::orchestrator::{Pacing, ScrapeOrchestrator};
use crate::scheduler::{ContentScheduler, ScrapeScheduler};
use crate::state::ScrapeStatus;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Shared metrics ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());
    let policy = FetchPolicy::from_config(&cfg);

    // --- Odds pipeline ---
    let sources = default_sources(&cfg.source_families);
    info!(
        sources = sources.len(),
        families = ?cfg.source_families,
        interval_minutes = cfg.scrape_interval_minutes,
        "odds sources configured"
    );
    let chrome_path = cfg.chrome_path.as_deref();
    let (fetcher, mode) = build_fetcher(cfg.fetch_mode, chrome_path, &policy, &health, &latency).await?;
    info!(mode = mode.as_str(), "odds fetcher ready");
    let orchestrator = Arc::new(ScrapeOrchestrator::new(
        sources,
        fetcher,
        Reconciler::new(pool.clone()),
        Arc::new(ScrapeStatus::new()),
        Arc::clone(&health),
        Pacing::from_config(&cfg),
    ));

    // Scrape scheduler (startup scrape, then every SCRAPE_INTERVAL_MINUTES)
    let scrape_scheduler = ScrapeScheduler::new(&cfg, Arc::clone(&orchestrator), pool.clone());
    tokio::spawn(async move { scrape_scheduler.run().await });

    // Content ingestion (each worker owns its own fetcher, and so its own browser)
    let mut content_fetchers: Vec<Arc<dyn PageFetcher>> = Vec::with_capacity(cfg.content_workers);
    for _ in 0..cfg.content_workers {
        let (fetcher, _) = build_fetcher(cfg.fetch_mode, chrome_path, &policy, &health, &latency).await?;
        content_fetchers.push(fetcher);
    }
    let ingestor = ContentIngestor::new(pool.clone(), CONTENT_SOURCES.to_vec(), content_fetchers);
    let content_scheduler = ContentScheduler::new(&cfg, ingestor);
    tokio::spawn(async move { content_scheduler.run().await });

    // HTTP API server
    let api_state = ApiState {
        pool,
        orchestrator,
        health,
        latency,
        stale_after_minutes: cfg.stale_after_minutes,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
