use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::OrderedEvent;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl ReconcileReport {
    /// Events written by this batch, new or existing.
    pub fn touched(&self) -> usize {
        self.created + self.updated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
}

/// Merges scraped batches into the store. Identity is
/// `(source_identifier, source_category_tag)`; the quote set of an event is
/// always replaced as a whole.
#[derive(Clone)]
pub struct Reconciler {
    pool: SqlitePool,
}

impl Reconciler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply a batch. Each event is its own transaction; a failing event is
    /// rolled back, logged and counted, and the rest of the batch continues.
    pub async fn apply(&self, batch: &[OrderedEvent], captured_at_ns: u64) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        for ordered in batch {
            match self.upsert(ordered, captured_at_ns as i64).await {
                Ok(Outcome::Created) => report.created += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Err(e) => {
                    warn!(
                        source_identifier = %ordered.source_identifier,
                        display_name = %ordered.event.display_name,
                        "upsert failed, skipping event: {e}"
                    );
                    report.failed += 1;
                }
            }
        }
        debug!(
            created = report.created,
            updated = report.updated,
            failed = report.failed,
            "batch reconciled"
        );
        report
    }

    async fn upsert(&self, ordered: &OrderedEvent, captured_at: i64) -> Result<Outcome> {
        let ev = &ordered.event;
        let tag = ev.family.as_str();
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM market_events WHERE source_identifier = ? AND source_category_tag = ?",
        )
        .bind(&ordered.source_identifier)
        .bind(tag)
        .fetch_optional(&mut *tx)
        .await?;

        let (event_id, outcome) = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE market_events
                    SET category = ?, group_label = ?, display_name = ?, scheduled_time = ?,
                        is_live = ?, lifecycle_status = ?, captured_at = ?, relative_order = ?
                    WHERE id = ?
                    "#,
                )
                .bind(ev.category.as_str())
                .bind(&ev.group_label)
                .bind(&ev.display_name)
                .bind(&ev.scheduled_time)
                .bind(ev.is_live)
                .bind(ev.status.as_str())
                .bind(captured_at)
                .bind(ordered.relative_order)
                .bind(id)
                .execute(&mut *tx)
                .await?;

                sqlx::query("DELETE FROM price_quotes WHERE event_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                (id, Outcome::Updated)
            }
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO market_events (
                        category, group_label, display_name, scheduled_time,
                        is_live, lifecycle_status, source_identifier, source_category_tag,
                        captured_at, first_seen_at, relative_order
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(ev.category.as_str())
                .bind(&ev.group_label)
                .bind(&ev.display_name)
                .bind(&ev.scheduled_time)
                .bind(ev.is_live)
                .bind(ev.status.as_str())
                .bind(&ordered.source_identifier)
                .bind(tag)
                .bind(captured_at)
                .bind(captured_at)
                .bind(ordered.relative_order)
                .execute(&mut *tx)
                .await?;
                (result.last_insert_rowid(), Outcome::Created)
            }
        };

        for (position, selection) in ev.selections.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO price_quotes (
                    event_id, selection_label, selection_role, position,
                    back_price, lay_price, captured_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(event_id)
            .bind(&selection.label)
            .bind(selection.role.to_string())
            .bind(position as i64)
            .bind(selection.back)
            .bind(selection.lay)
            .bind(captured_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::types::{
        Category, LifecycleStatus, NormalizedEvent, Selection, SelectionRole, SourceFamily,
    };

    fn selection(label: &str, role: SelectionRole, back: f64) -> Selection {
        Selection {
            label: label.to_string(),
            role,
            back: Some(back),
            lay: Some(back + 0.02),
        }
    }

    fn ordered(name: &str, id: &str, order: i64, selections: Vec<Selection>) -> OrderedEvent {
        OrderedEvent {
            event: NormalizedEvent {
                category: Category::Football,
                family: SourceFamily::Exchange,
                group_label: "Premier League".to_string(),
                display_name: name.to_string(),
                scheduled_time: Some("Today 15:00".to_string()),
                is_live: false,
                status: LifecycleStatus::Upcoming,
                link: Some(id.to_string()),
                selections,
            },
            source_identifier: id.to_string(),
            relative_order: order,
        }
    }

    fn three_way(name: &str, id: &str, order: i64) -> OrderedEvent {
        let (home, away) = name.split_once(" v ").unwrap_or((name, "Away"));
        ordered(
            name,
            id,
            order,
            vec![
                selection(home, SelectionRole::Home, 2.0),
                selection("Draw", SelectionRole::Draw, 3.5),
                selection(away, SelectionRole::Away, 4.0),
            ],
        )
    }

    async fn count(pool: &SqlitePool, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
    }

    async fn quote_ids(pool: &SqlitePool) -> Vec<i64> {
        sqlx::query_scalar("SELECT id FROM price_quotes ORDER BY id")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reapplying_same_batch_keeps_events_and_replaces_quotes() {
        let pool = test_pool().await;
        let reconciler = Reconciler::new(pool.clone());
        let batch = vec![
            three_way("Arsenal v Chelsea", "https://x.test/market/1", 0),
            three_way("Leeds v Hull", "https://x.test/market/2", 1),
        ];

        let first = reconciler.apply(&batch, 1_000).await;
        assert_eq!(first, ReconcileReport { created: 2, updated: 0, failed: 0 });
        let ids_before = quote_ids(&pool).await;

        let second = reconciler.apply(&batch, 2_000).await;
        assert_eq!(second, ReconcileReport { created: 0, updated: 2, failed: 0 });
        assert_eq!(second.touched(), 2);

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM market_events").await, 2);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM price_quotes").await, 6);
        let ids_after = quote_ids(&pool).await;
        assert!(ids_before.iter().all(|id| !ids_after.contains(id)));

        let (captured, first_seen): (i64, i64) = sqlx::query_as(
            "SELECT captured_at, first_seen_at FROM market_events WHERE source_identifier = ?",
        )
        .bind("https://x.test/market/1")
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(captured, 2_000);
        assert_eq!(first_seen, 1_000);
    }

    #[tokio::test]
    async fn one_failing_event_does_not_sink_the_batch() {
        let pool = test_pool().await;
        sqlx::query(
            r#"
            CREATE TRIGGER fail_one BEFORE INSERT ON market_events
            WHEN NEW.display_name = 'Boom v Bust'
            BEGIN SELECT RAISE(ABORT, 'forced failure'); END;
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let batch: Vec<OrderedEvent> = (0..10)
            .map(|i| {
                let name = if i == 4 {
                    "Boom v Bust".to_string()
                } else {
                    format!("Home{i} v Away{i}")
                };
                three_way(&name, &format!("https://x.test/market/{i}"), i)
            })
            .collect();

        let report = Reconciler::new(pool.clone()).apply(&batch, 1_000).await;
        assert_eq!(report, ReconcileReport { created: 9, updated: 0, failed: 1 });
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM market_events").await, 9);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM price_quotes").await, 27);
    }

    #[tokio::test]
    async fn shrinking_selection_set_leaves_no_stale_quotes() {
        let pool = test_pool().await;
        let reconciler = Reconciler::new(pool.clone());
        let id = "https://x.test/market/race";
        let runners = |n: usize| {
            (0..n)
                .map(|i| {
                    selection(&format!("Runner {}", i + 1), SelectionRole::Positional(i + 1), 5.0)
                })
                .collect::<Vec<_>>()
        };

        reconciler.apply(&[ordered("14:30 Cheltenham", id, 0, runners(4))], 1).await;
        reconciler.apply(&[ordered("14:30 Cheltenham", id, 0, runners(3))], 2).await;

        let labels: Vec<String> =
            sqlx::query_scalar("SELECT selection_label FROM price_quotes ORDER BY position")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(labels, vec!["Runner 1", "Runner 2", "Runner 3"]);
    }

    #[tokio::test]
    async fn same_identifier_under_another_family_is_a_separate_event() {
        let pool = test_pool().await;
        let reconciler = Reconciler::new(pool.clone());
        let exchange = three_way("Arsenal v Chelsea", "https://x.test/e/1", 0);
        let mut sportsbook = exchange.clone();
        sportsbook.event.family = SourceFamily::Sportsbook;

        let report = reconciler.apply(&[exchange, sportsbook], 1).await;
        assert_eq!(report.created, 2);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM market_events").await, 2);
    }

    #[tokio::test]
    async fn empty_display_name_is_rejected_by_the_store() {
        let pool = test_pool().await;
        let report = Reconciler::new(pool.clone())
            .apply(&[three_way("  ", "https://x.test/market/blank", 0)], 1)
            .await;
        assert_eq!(report.failed, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM market_events").await, 0);
    }
}
