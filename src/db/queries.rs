//! Read-side queries for the API plus the retention purge.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::freshness_thresholds::{FRESH_MAX_MINUTES, MODERATE_MAX_MINUTES};
use crate::db::models::{CategoryCountRow, ContentRow, EventRow, EventWithQuotes, QuoteRow};
use crate::error::Result;

const NS_PER_MINUTE: f64 = 60.0 * 1_000_000_000.0;
const NS_PER_HOUR: i64 = 3_600 * 1_000_000_000;

const EVENT_COLUMNS: &str = "id, category, group_label, display_name, scheduled_time, is_live, \
     lifecycle_status, source_identifier, source_category_tag, captured_at, first_seen_at, \
     relative_order";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub category: Option<String>,
    /// Source family tag (`exchange` / `sportsbook`).
    pub tag: Option<String>,
    pub live: Option<bool>,
    /// Only events captured within this many minutes.
    pub max_age_minutes: Option<f64>,
}

/// Events matching `filter`, in source display order, each with its quotes.
pub async fn list_events(
    pool: &SqlitePool,
    filter: &EventFilter,
    now_ns: u64,
) -> Result<Vec<EventWithQuotes>> {
    let min_captured_at = filter
        .max_age_minutes
        .map(|m| now_ns as i64 - (m * NS_PER_MINUTE) as i64);

    let sql = format!(
        r#"
        SELECT {EVENT_COLUMNS}
        FROM market_events
        WHERE (? IS NULL OR category = ?)
          AND (? IS NULL OR source_category_tag = ?)
          AND (? IS NULL OR is_live = ?)
          AND (? IS NULL OR captured_at >= ?)
        ORDER BY relative_order ASC, id ASC
        "#
    );
    let events: Vec<EventRow> = sqlx::query_as(&sql)
        .bind(&filter.category)
        .bind(&filter.category)
        .bind(&filter.tag)
        .bind(&filter.tag)
        .bind(filter.live)
        .bind(filter.live)
        .bind(min_captured_at)
        .bind(min_captured_at)
        .fetch_all(pool)
        .await?;

    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let quotes = quotes_for(pool, event.id).await?;
        out.push(EventWithQuotes { event, quotes });
    }
    Ok(out)
}

pub async fn get_event(pool: &SqlitePool, id: i64) -> Result<Option<EventWithQuotes>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM market_events WHERE id = ?");
    let Some(event) = sqlx::query_as::<_, EventRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };
    let quotes = quotes_for(pool, event.id).await?;
    Ok(Some(EventWithQuotes { event, quotes }))
}

async fn quotes_for(pool: &SqlitePool, event_id: i64) -> Result<Vec<QuoteRow>> {
    let quotes = sqlx::query_as::<_, QuoteRow>(
        r#"
        SELECT id, event_id, selection_label, selection_role, position,
               back_price, lay_price, captured_at
        FROM price_quotes
        WHERE event_id = ?
        ORDER BY position ASC
        "#,
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;
    Ok(quotes)
}

pub async fn category_counts(pool: &SqlitePool) -> Result<Vec<CategoryCountRow>> {
    let rows = sqlx::query_as::<_, CategoryCountRow>(
        r#"
        SELECT category,
               COUNT(*) AS event_count,
               COALESCE(SUM(is_live), 0) AS live_count
        FROM market_events
        GROUP BY category
        ORDER BY event_count DESC, category ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Delete events (and by cascade their quotes) not captured within
/// `retention_hours`. Returns the number of events removed.
pub async fn purge_older_than(pool: &SqlitePool, retention_hours: u64, now_ns: u64) -> Result<u64> {
    let cutoff = retention_cutoff(now_ns, retention_hours);
    let result = sqlx::query("DELETE FROM market_events WHERE captured_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Capture-time cutoff for a retention window. Saturates, so a huge window
/// keeps everything instead of wrapping into the future.
fn retention_cutoff(now_ns: u64, retention_hours: u64) -> i64 {
    let window = i64::try_from(retention_hours)
        .unwrap_or(i64::MAX)
        .saturating_mul(NS_PER_HOUR);
    i64::try_from(now_ns).unwrap_or(i64::MAX).saturating_sub(window)
}

// ---------------------------------------------------------------------------
// Freshness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Freshness {
    pub newest_age_minutes: Option<f64>,
    pub oldest_age_minutes: Option<f64>,
    pub total_count: i64,
}

impl Freshness {
    pub fn label(&self) -> &'static str {
        match self.newest_age_minutes {
            None => "No data",
            Some(age) if age < FRESH_MAX_MINUTES => "Fresh",
            Some(age) if age < MODERATE_MAX_MINUTES => "Moderate",
            Some(_) => "Stale",
        }
    }

    /// Whether anything derived from the store (cached analysis, summaries)
    /// should be regenerated. An empty store is always stale.
    pub fn is_stale(&self, threshold_minutes: f64) -> bool {
        self.newest_age_minutes
            .map_or(true, |age| age >= threshold_minutes)
    }
}

pub async fn freshness(pool: &SqlitePool, now_ns: u64) -> Result<Freshness> {
    let (newest, oldest, total): (Option<i64>, Option<i64>, i64) = sqlx::query_as(
        "SELECT MAX(captured_at), MIN(captured_at), COUNT(*) FROM market_events",
    )
    .fetch_one(pool)
    .await?;

    let age = |ts: i64| round1((now_ns as i64 - ts).max(0) as f64 / NS_PER_MINUTE);
    Ok(Freshness {
        newest_age_minutes: newest.map(age),
        oldest_age_minutes: oldest.map(age),
        total_count: total,
    })
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Scraped content
// ---------------------------------------------------------------------------

/// One news/social item ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContent {
    pub source: String,
    pub content_type: String,
    pub title: String,
    pub url: String,
    pub image_url: Option<String>,
    pub engagement_score: i64,
    pub comments_count: i64,
    pub related_teams: Vec<String>,
    pub related_competition: Option<String>,
}

/// Insert or refresh an item keyed by URL. Returns true when the URL was new.
pub async fn upsert_content(pool: &SqlitePool, item: &NewContent, captured_at: i64) -> Result<bool> {
    let teams = serde_json::to_string(&item.related_teams)?;
    let existed: Option<i64> = sqlx::query_scalar("SELECT id FROM scraped_content WHERE url = ?")
        .bind(&item.url)
        .fetch_optional(pool)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO scraped_content (
            source, content_type, title, url, image_url, engagement_score,
            comments_count, related_teams, related_competition, captured_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(url) DO UPDATE SET
            title = excluded.title,
            image_url = excluded.image_url,
            engagement_score = excluded.engagement_score,
            comments_count = excluded.comments_count,
            related_teams = excluded.related_teams,
            related_competition = excluded.related_competition,
            captured_at = excluded.captured_at
        "#,
    )
    .bind(&item.source)
    .bind(&item.content_type)
    .bind(&item.title)
    .bind(&item.url)
    .bind(&item.image_url)
    .bind(item.engagement_score)
    .bind(item.comments_count)
    .bind(teams)
    .bind(&item.related_competition)
    .bind(captured_at)
    .execute(pool)
    .await?;

    Ok(existed.is_none())
}

/// Drop content items not refreshed within `retention_hours`.
pub async fn purge_content_older_than(
    pool: &SqlitePool,
    retention_hours: u64,
    now_ns: u64,
) -> Result<u64> {
    let cutoff = retention_cutoff(now_ns, retention_hours);
    let result = sqlx::query("DELETE FROM scraped_content WHERE captured_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn list_content(pool: &SqlitePool, limit: i64) -> Result<Vec<ContentRow>> {
    let rows = sqlx::query_as::<_, ContentRow>(
        r#"
        SELECT id, source, content_type, title, url, image_url, engagement_score,
               comments_count, related_teams, related_competition, captured_at
        FROM scraped_content
        ORDER BY captured_at DESC, engagement_score DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, Reconciler};
    use crate::types::{
        Category, LifecycleStatus, NormalizedEvent, OrderedEvent, Selection, SelectionRole,
        SourceFamily,
    };

    const MINUTE: u64 = 60 * 1_000_000_000;

    fn event(name: &str, category: Category, live: bool, order: i64) -> OrderedEvent {
        OrderedEvent {
            event: NormalizedEvent {
                category,
                family: SourceFamily::Exchange,
                group_label: "Other".to_string(),
                display_name: name.to_string(),
                scheduled_time: None,
                is_live: live,
                status: if live {
                    LifecycleStatus::Live
                } else {
                    LifecycleStatus::Upcoming
                },
                link: None,
                selections: vec![
                    Selection {
                        label: "B".to_string(),
                        role: SelectionRole::Away,
                        back: Some(3.0),
                        lay: None,
                    },
                ],
            },
            source_identifier: format!("https://x.test/{name}"),
            relative_order: order,
        }
    }

    async fn seeded() -> SqlitePool {
        let pool = test_pool().await;
        let reconciler = Reconciler::new(pool.clone());
        reconciler
            .apply(
                &[
                    event("Leeds v Hull", Category::Football, false, 1),
                    event("Arsenal v Chelsea", Category::Football, true, 0),
                ],
                100 * MINUTE,
            )
            .await;
        reconciler
            .apply(&[event("Nadal v Federer", Category::Tennis, false, 0)], 90 * MINUTE)
            .await;
        pool
    }

    #[tokio::test]
    async fn lists_in_display_order_with_filters() {
        let pool = seeded().await;
        let all = list_events(&pool, &EventFilter::default(), 100 * MINUTE).await.unwrap();
        assert_eq!(all.len(), 3);

        let football = EventFilter {
            category: Some("football".to_string()),
            ..Default::default()
        };
        let rows = list_events(&pool, &football, 100 * MINUTE).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.event.display_name.as_str()).collect();
        assert_eq!(names, vec!["Arsenal v Chelsea", "Leeds v Hull"]);
        assert_eq!(rows[0].quotes.len(), 1);

        let live = EventFilter {
            live: Some(true),
            ..Default::default()
        };
        assert_eq!(list_events(&pool, &live, 100 * MINUTE).await.unwrap().len(), 1);

        let recent = EventFilter {
            max_age_minutes: Some(5.0),
            ..Default::default()
        };
        assert_eq!(list_events(&pool, &recent, 100 * MINUTE).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn counts_per_category() {
        let pool = seeded().await;
        let counts = category_counts(&pool).await.unwrap();
        assert_eq!(counts[0].category, "football");
        assert_eq!(counts[0].event_count, 2);
        assert_eq!(counts[0].live_count, 1);
        assert_eq!(counts[1].category, "tennis");
    }

    #[tokio::test]
    async fn freshness_reports_ages_and_labels() {
        let pool = seeded().await;
        let fresh = freshness(&pool, 120 * MINUTE).await.unwrap();
        assert_eq!(fresh.total_count, 3);
        assert_eq!(fresh.newest_age_minutes, Some(20.0));
        assert_eq!(fresh.oldest_age_minutes, Some(30.0));
        assert_eq!(fresh.label(), "Moderate");
        assert!(!fresh.is_stale(30.0));
        assert!(fresh.is_stale(15.0));

        let empty = freshness(&test_pool().await, 0).await.unwrap();
        assert_eq!(empty.total_count, 0);
        assert_eq!(empty.newest_age_minutes, None);
        assert!(empty.is_stale(30.0));
    }

    #[tokio::test]
    async fn purge_removes_old_events_and_their_quotes() {
        let pool = seeded().await;
        // One hour of retention at minute 155: the cutoff is minute 95, so the
        // tennis event captured at minute 90 goes.
        let removed = purge_older_than(&pool, 1, 155 * MINUTE).await.unwrap();
        assert_eq!(removed, 1);
        let quotes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_quotes")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(quotes, 2);
    }

    #[tokio::test]
    async fn huge_retention_window_purges_nothing() {
        let pool = seeded().await;
        assert_eq!(purge_older_than(&pool, 3_000_000, 155 * MINUTE).await.unwrap(), 0);
        assert_eq!(purge_older_than(&pool, u64::MAX, 155 * MINUTE).await.unwrap(), 0);
        assert_eq!(purge_content_older_than(&pool, u64::MAX, 155 * MINUTE).await.unwrap(), 0);
        let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM market_events")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(events, 3);
    }

    #[tokio::test]
    async fn get_event_returns_none_for_unknown_id() {
        let pool = seeded().await;
        assert!(get_event(&pool, 9_999).await.unwrap().is_none());
        let first = list_events(&pool, &EventFilter::default(), 0).await.unwrap();
        let found = get_event(&pool, first[0].event.id).await.unwrap().unwrap();
        assert_eq!(found.event.display_name, first[0].event.display_name);
    }

    #[tokio::test]
    async fn content_upsert_counts_only_new_urls() {
        let pool = test_pool().await;
        let mut item = NewContent {
            source: "BBC Sport".to_string(),
            content_type: "article".to_string(),
            title: "Arsenal edge Chelsea".to_string(),
            url: "https://news.test/a".to_string(),
            image_url: None,
            engagement_score: 0,
            comments_count: 0,
            related_teams: vec!["Arsenal".to_string(), "Chelsea".to_string()],
            related_competition: Some("Premier League".to_string()),
        };
        assert!(upsert_content(&pool, &item, 1).await.unwrap());
        item.title = "Arsenal edge Chelsea (updated)".to_string();
        assert!(!upsert_content(&pool, &item, 2).await.unwrap());

        let rows = list_content(&pool, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Arsenal edge Chelsea (updated)");
        assert_eq!(rows[0].related_teams, r#"["Arsenal","Chelsea"]"#);

        let hour = 3_600 * 1_000_000_000;
        assert_eq!(purge_content_older_than(&pool, 1, hour).await.unwrap(), 0);
        assert_eq!(purge_content_older_than(&pool, 1, 2 * hour).await.unwrap(), 1);
    }
}
