use anyhow::Result;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use time::Date;

use crate::domain::StoredRecord;

const RECORD_COLUMNS: &str = "id, publish_time, business_type, psr_type, quantity, start_time, \
     settlement_date, settlement_period, fuel_type, region, created_at, updated_at";

/// Optional filters for [`get_data`]. Date bounds are inclusive; fuel types
/// match `psr_type` case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct GenerationFilter {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub fuel_types: Option<Vec<String>>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FuelTypeBreakdown {
    pub fuel_type: String,
    pub count: i64,
    pub avg_quantity: f64,
    pub total_quantity: f64,
    pub min_date: Option<String>,
    pub max_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRange {
    pub min: Option<String>,
    pub max: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_records: i64,
    pub unique_dates: i64,
    pub fuel_type_breakdown: Vec<FuelTypeBreakdown>,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DailyTotal {
    pub settlement_date: Date,
    pub psr_type: String,
    pub daily_total: Option<f64>,
}

/// Filtered retrieval ordered by (settlement_date, settlement_period).
pub async fn get_data(pool: &SqlitePool, filter: &GenerationFilter) -> Result<Vec<StoredRecord>> {
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {RECORD_COLUMNS} FROM wind_solar_generation WHERE 1 = 1"
    ));

    if let Some(start) = filter.start_date {
        builder.push(" AND settlement_date >= ").push_bind(start);
    }
    if let Some(end) = filter.end_date {
        builder.push(" AND settlement_date <= ").push_bind(end);
    }
    if let Some(fuel_types) = filter.fuel_types.as_ref().filter(|f| !f.is_empty()) {
        builder.push(" AND LOWER(psr_type) IN (");
        let mut separated = builder.separated(", ");
        for ft in fuel_types {
            separated.push_bind(ft.to_lowercase());
        }
        separated.push_unseparated(")");
    }

    builder.push(" ORDER BY settlement_date, settlement_period");

    if let Some(limit) = filter.limit {
        builder.push(" LIMIT ").push_bind(limit);
    }

    let rows = builder.build_query_as::<StoredRecord>().fetch_all(pool).await?;
    Ok(rows)
}

pub async fn get_data_by_date_range(pool: &SqlitePool, start: Date, end: Date) -> Result<Vec<StoredRecord>> {
    let filter = GenerationFilter {
        start_date: Some(start),
        end_date: Some(end),
        ..Default::default()
    };
    get_data(pool, &filter).await
}

/// Records of one fuel type, newest first.
pub async fn get_fuel_type_data(pool: &SqlitePool, fuel_type: &str, limit: Option<i64>) -> Result<Vec<StoredRecord>> {
    let rows = sqlx::query_as::<_, StoredRecord>(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM wind_solar_generation
        WHERE psr_type = $1
        ORDER BY settlement_date DESC, settlement_period DESC
        LIMIT $2
        "#
    ))
    .bind(fuel_type)
    .bind(limit.unwrap_or(-1))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn get_latest_record(pool: &SqlitePool) -> Result<Option<StoredRecord>> {
    let row = sqlx::query_as::<_, StoredRecord>(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM wind_solar_generation
        ORDER BY settlement_date DESC, settlement_period DESC
        LIMIT 1
        "#
    ))
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Sum of quantity per settlement date and fuel type.
pub async fn get_daily_totals(pool: &SqlitePool, start: Option<Date>, end: Option<Date>) -> Result<Vec<DailyTotal>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT settlement_date, psr_type, SUM(quantity) AS daily_total FROM wind_solar_generation WHERE 1 = 1",
    );
    if let Some(start) = start {
        builder.push(" AND settlement_date >= ").push_bind(start);
    }
    if let Some(end) = end {
        builder.push(" AND settlement_date <= ").push_bind(end);
    }
    builder.push(" GROUP BY settlement_date, psr_type ORDER BY settlement_date, psr_type");

    let rows = builder.build_query_as::<DailyTotal>().fetch_all(pool).await?;
    Ok(rows)
}

pub async fn count_records(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM wind_solar_generation")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn get_summary_stats(pool: &SqlitePool) -> Result<SummaryStats> {
    let total_records = count_records(pool).await?;
    if total_records == 0 {
        return Ok(SummaryStats::default());
    }

    let (min, max) = sqlx::query_as::<_, (Option<String>, Option<String>)>(
        "SELECT MIN(settlement_date), MAX(settlement_date) FROM wind_solar_generation",
    )
    .fetch_one(pool)
    .await?;

    let unique_dates =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT settlement_date) FROM wind_solar_generation")
            .fetch_one(pool)
            .await?;

    let fuel_type_breakdown = sqlx::query_as::<_, FuelTypeBreakdown>(
        r#"
        SELECT
            psr_type                        AS fuel_type,
            COUNT(*)                        AS count,
            COALESCE(AVG(quantity), 0.0)    AS avg_quantity,
            COALESCE(SUM(quantity), 0.0)    AS total_quantity,
            MIN(settlement_date)            AS min_date,
            MAX(settlement_date)            AS max_date
        FROM wind_solar_generation
        GROUP BY psr_type
        ORDER BY psr_type
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(SummaryStats {
        total_records,
        unique_dates,
        fuel_type_breakdown,
        date_range: DateRange { min, max },
    })
}
