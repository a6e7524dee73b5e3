pub mod models;
pub mod queries;
pub mod reconciler;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::Result;

pub use reconciler::Reconciler;

/// Open (creating if needed) the database file and apply migrations.
pub async fn connect(db_path: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&format!("sqlite:{db_path}?mode=rwc"))
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Fresh in-memory database with the schema applied. One connection only:
/// every connection to `sqlite::memory:` is its own database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations apply");
    pool
}
