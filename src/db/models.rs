//! Database row types matching `migrations/20260101000000_init.sql`.
//! Used by sqlx for typed queries.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub category: String,
    pub group_label: String,
    pub display_name: String,
    pub scheduled_time: Option<String>,
    pub is_live: bool,
    pub lifecycle_status: String,
    pub source_identifier: String,
    pub source_category_tag: String,
    pub captured_at: i64,
    pub first_seen_at: i64,
    pub relative_order: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct QuoteRow {
    pub id: i64,
    pub event_id: i64,
    pub selection_label: String,
    pub selection_role: String,
    pub position: i64,
    pub back_price: Option<f64>,
    pub lay_price: Option<f64>,
    pub captured_at: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryCountRow {
    pub category: String,
    pub event_count: i64,
    pub live_count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContentRow {
    pub id: i64,
    pub source: String,
    pub content_type: String,
    pub title: String,
    pub url: String,
    pub image_url: Option<String>,
    pub engagement_score: i64,
    pub comments_count: i64,
    /// JSON array of team names.
    pub related_teams: String,
    pub related_competition: Option<String>,
    pub captured_at: i64,
}

/// An event together with its current quote set, in position order.
#[derive(Debug, Clone, Serialize)]
pub struct EventWithQuotes {
    #[serde(flatten)]
    pub event: EventRow,
    pub quotes: Vec<QuoteRow>,
}
