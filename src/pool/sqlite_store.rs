//! SQLite-backed pool for single-host deployments

use crate::pool::store::PoolStore;
use crate::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS proxy_pool (
    pool_key TEXT NOT NULL,
    address TEXT NOT NULL,
    score REAL NOT NULL,
    discovered_at TEXT NOT NULL,
    PRIMARY KEY (pool_key, address)
)
"#;

/// Pool kept in one SQLite table keyed by `(pool_key, address)`
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`, e.g. `sqlite://pool.db`
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // in-memory databases are per connection
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl PoolStore for SqliteStore {
    async fn score_of(&self, pool_key: &str, address: &str) -> Result<Option<f64>> {
        let score = sqlx::query_scalar::<_, f64>(
            "SELECT score FROM proxy_pool WHERE pool_key = ? AND address = ?",
        )
        .bind(pool_key)
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(score)
    }

    async fn insert(&self, pool_key: &str, address: &str, score: f64) -> Result<()> {
        sqlx::query(
            "INSERT INTO proxy_pool (pool_key, address, score, discovered_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (pool_key, address) DO UPDATE SET score = excluded.score",
        )
        .bind(pool_key)
        .bind(address)
        .bind(score)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
