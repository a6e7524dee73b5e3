use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::db::models::{CategoryCountRow, ContentRow, EventWithQuotes};
use crate::db::queries::{self, EventFilter, Freshness};
use crate::error::AppError;
use crate::orchestrator::ScrapeOrchestrator;
use crate::state::{RunState, StatusReport};
use crate::types::{now_ns, Category, SourceFamily};

const DEFAULT_CONTENT_LIMIT: i64 = 50;
const MAX_CONTENT_LIMIT: i64 = 200;

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub orchestrator: Arc<ScrapeOrchestrator>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub stale_after_minutes: f64,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/events", get(get_events))
        .route("/events/live", get(get_live_events))
        .route("/events/:id", get(get_event))
        .route("/categories", get(get_categories))
        .route("/freshness", get(get_freshness))
        .route("/scrape/trigger", post(trigger_scrape))
        .route("/scrape/status", get(get_scrape_status))
        .route("/content", get(get_content))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub live: Option<bool>,
    pub max_age_minutes: Option<f64>,
}

impl TryFrom<EventsQuery> for EventFilter {
    type Error = AppError;

    /// Unknown categories and tags are a 404 rather than an empty list.
    fn try_from(q: EventsQuery) -> Result<Self, AppError> {
        let category = q
            .category
            .map(|c| {
                Category::parse(&c)
                    .map(|c| c.as_str().to_string())
                    .ok_or_else(|| AppError::NotFound(format!("category '{c}'")))
            })
            .transpose()?;
        let tag = q
            .tag
            .map(|t| {
                SourceFamily::parse(&t)
                    .map(|f| f.as_str().to_string())
                    .ok_or_else(|| AppError::NotFound(format!("source tag '{t}'")))
            })
            .transpose()?;
        Ok(EventFilter {
            category,
            tag,
            live: q.live,
            max_age_minutes: q.max_age_minutes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ContentQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub scrape_state: RunState,
    #[serde(flatten)]
    pub counters: HealthSnapshot,
}

#[derive(Serialize)]
pub struct FreshnessResponse {
    #[serde(flatten)]
    pub freshness: Freshness,
    pub is_fresh: bool,
    pub label: &'static str,
}

#[derive(Serialize)]
pub struct TriggerResponse {
    pub total: usize,
    pub counts: BTreeMap<String, usize>,
    pub summary: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        scrape_state: state.orchestrator.status().report().state,
        counters: state.health.snapshot(),
    })
}

async fn get_events(
    State(state): State<ApiState>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<Vec<EventWithQuotes>>, AppError> {
    let filter = EventFilter::try_from(params)?;
    Ok(Json(queries::list_events(&state.pool, &filter, now_ns()).await?))
}

async fn get_live_events(
    State(state): State<ApiState>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<Vec<EventWithQuotes>>, AppError> {
    let filter = EventFilter {
        live: Some(true),
        ..EventFilter::try_from(params)?
    };
    Ok(Json(queries::list_events(&state.pool, &filter, now_ns()).await?))
}

async fn get_event(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<EventWithQuotes>, AppError> {
    queries::get_event(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("event {id}")))
}

async fn get_categories(
    State(state): State<ApiState>,
) -> Result<Json<Vec<CategoryCountRow>>, AppError> {
    Ok(Json(queries::category_counts(&state.pool).await?))
}

async fn get_freshness(State(state): State<ApiState>) -> Result<Json<FreshnessResponse>, AppError> {
    let freshness = queries::freshness(&state.pool, now_ns()).await?;
    Ok(Json(FreshnessResponse {
        is_fresh: !freshness.is_stale(state.stale_after_minutes),
        label: freshness.label(),
        freshness,
    }))
}

/// Runs a full scrape and waits for it. 409 if one is already running.
///
/// The run lives on its own task, so a client that disconnects mid-scrape
/// does not cancel it halfway through.
async fn trigger_scrape(State(state): State<ApiState>) -> Result<Json<TriggerResponse>, AppError> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let result = tokio::spawn(async move { orchestrator.try_run().await })
        .await?
        .ok_or(AppError::Busy)?;
    Ok(Json(TriggerResponse {
        summary: result.summary(),
        total: result.total,
        counts: result.counts,
    }))
}

async fn get_scrape_status(State(state): State<ApiState>) -> Json<StatusReport> {
    Json(state.orchestrator.status().report())
}

async fn get_content(
    State(state): State<ApiState>,
    Query(params): Query<ContentQuery>,
) -> Result<Json<Vec<ContentRow>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_CONTENT_LIMIT)
        .clamp(1, MAX_CONTENT_LIMIT);
    Ok(Json(queries::list_content(&state.pool, limit).await?))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}
