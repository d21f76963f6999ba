use sqlx::{Connection, Sqlite, Transaction};
use time::OffsetDateTime;
use windsolar_client::{
    db::Database,
    domain::{NaturalKey, NewGenerationRecord, NormalizedRecord, RecordError},
};

use super::RecordSink;

const PROBE_SQL: &str = r#"
    SELECT id FROM wind_solar_generation
    WHERE settlement_date = ? AND settlement_period = ? AND psr_type = ?
"#;

const UPSERT_SQL: &str = r#"
    INSERT INTO wind_solar_generation (
        publish_time, business_type, psr_type, quantity, start_time,
        settlement_date, settlement_period, fuel_type, region,
        created_at, updated_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (settlement_date, settlement_period, psr_type) DO UPDATE SET
        publish_time  = excluded.publish_time,
        business_type = excluded.business_type,
        quantity      = excluded.quantity,
        start_time    = excluded.start_time,
        fuel_type     = excluded.fuel_type,
        region        = excluded.region,
        updated_at    = excluded.updated_at
"#;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum RecordWriteError {
    #[error(transparent)]
    Invalid(#[from] RecordError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug)]
pub struct RecordFailure {
    /// Position in the input batch.
    pub index: usize,
    pub key: NaturalKey,
    pub error: RecordWriteError,
}

#[derive(Debug, Default)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
    pub failures: Vec<RecordFailure>,
}

impl UpsertReport {
    pub fn stored(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

enum Written {
    Inserted,
    Updated,
}

#[derive(Debug, Clone)]
pub struct SqliteGenerationStore {
    db: Database,
}

impl SqliteGenerationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Write one row under its own savepoint so a failing statement leaves the
/// surrounding batch intact.
async fn write_row(
    tx: &mut Transaction<'_, Sqlite>,
    row: &NewGenerationRecord,
    now: OffsetDateTime,
) -> Result<Written, sqlx::Error> {
    let mut sp = tx.begin().await?;

    let existing: Option<i64> = sqlx::query_scalar(PROBE_SQL)
        .bind(row.settlement_date)
        .bind(row.settlement_period)
        .bind(&row.psr_type)
        .fetch_optional(&mut *sp)
        .await?;

    sqlx::query(UPSERT_SQL)
        .bind(row.publish_time)
        .bind(&row.business_type)
        .bind(&row.psr_type)
        .bind(row.quantity)
        .bind(row.start_time)
        .bind(row.settlement_date)
        .bind(row.settlement_period)
        .bind(&row.fuel_type)
        .bind(&row.region)
        .bind(now)
        .bind(now)
        .execute(&mut *sp)
        .await?;

    sp.commit().await?;

    Ok(if existing.is_some() {
        Written::Updated
    } else {
        Written::Inserted
    })
}

#[async_trait::async_trait]
impl RecordSink for SqliteGenerationStore {
    async fn upsert(&self, records: &[NormalizedRecord]) -> Result<UpsertReport, StoreError> {
        let mut report = UpsertReport::default();
        if records.is_empty() {
            tracing::warn!("no records to store");
            return Ok(report);
        }

        let now = OffsetDateTime::now_utc();
        let mut tx = self.db.pool().begin().await?;

        for (index, record) in records.iter().enumerate() {
            let written = match record.to_new_record() {
                Ok(row) => write_row(&mut tx, &row, now).await.map_err(RecordWriteError::from),
                Err(e) => Err(RecordWriteError::from(e)),
            };

            match written {
                Ok(Written::Inserted) => report.inserted += 1,
                Ok(Written::Updated) => report.updated += 1,
                Err(error) => {
                    let key = record.natural_key();
                    tracing::error!(index, %key, error = %error, "error storing record");
                    report.failures.push(RecordFailure { index, key, error });
                }
            }
        }

        tx.commit().await?;

        metrics::counter!("store_records_upserted_total").increment(report.stored() as u64);
        metrics::counter!("store_records_failed_total").increment(report.failed() as u64);
        tracing::info!(
            inserted = report.inserted,
            updated = report.updated,
            errors = report.failed(),
            "data storage completed"
        );

        Ok(report)
    }

    async fn clear_all(&self) -> Result<u64, StoreError> {
        let deleted = sqlx::query("DELETE FROM wind_solar_generation")
            .execute(self.db.pool())
            .await?
            .rows_affected();
        tracing::warn!(deleted, "cleared all generation records");
        Ok(deleted)
    }
}
