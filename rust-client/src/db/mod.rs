pub mod generation_queries;

use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS wind_solar_generation (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        publish_time      TEXT,
        business_type     TEXT,
        psr_type          TEXT    NOT NULL,
        quantity          REAL,
        start_time        TEXT,
        settlement_date   TEXT    NOT NULL,
        settlement_period INTEGER NOT NULL,
        fuel_type         TEXT,
        region            TEXT,
        created_at        TEXT    NOT NULL,
        updated_at        TEXT    NOT NULL,
        CONSTRAINT unique_generation_record UNIQUE (settlement_date, settlement_period, psr_type)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_composite_query
        ON wind_solar_generation (settlement_date, psr_type, settlement_period)
    "#,
];

/// Handle to the generation store.
///
/// Constructed explicitly and passed to whoever needs it; cloning shares the
/// underlying pool. Call [`Database::close`] on shutdown to release connections.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        tracing::info!(url, "database connection initialized");
        Ok(db)
    }

    /// A private in-memory database. A single pinned connection keeps the data
    /// alive for the lifetime of the handle.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("database connection closed");
    }
}
