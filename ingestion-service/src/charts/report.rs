use std::collections::BTreeMap;

use serde::Serialize;
use time::Date;
use windsolar_client::domain::StoredRecord;

use super::ChartError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDateRange {
    pub start: Date,
    pub end: Date,
    /// Inclusive day count.
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelTypeStats {
    pub total_generation: f64,
    pub avg_generation: f64,
    pub max_generation: f64,
    pub record_count: usize,
}

/// Statistics over per-date totals (all fuel types summed).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub avg_daily_generation: f64,
    pub max_daily_generation: f64,
    pub min_daily_generation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub total_records: usize,
    pub date_range: ReportDateRange,
    pub fuel_type_stats: BTreeMap<String, FuelTypeStats>,
    pub daily_stats: DailyStats,
}

/// Null quantities count as zero.
pub fn generate_summary_report(records: &[StoredRecord]) -> Result<SummaryReport, ChartError> {
    let first = records.first().ok_or(ChartError::NoData)?;

    let mut start = first.settlement_date;
    let mut end = first.settlement_date;
    let mut by_fuel: BTreeMap<String, (f64, f64, usize)> = BTreeMap::new();
    let mut by_day: BTreeMap<Date, f64> = BTreeMap::new();

    for r in records {
        let q = r.quantity.unwrap_or(0.0);
        start = start.min(r.settlement_date);
        end = end.max(r.settlement_date);

        let (total, max, count) = by_fuel
            .entry(r.psr_type.clone())
            .or_insert((0.0, f64::NEG_INFINITY, 0));
        *total += q;
        *max = f64::max(*max, q);
        *count += 1;

        *by_day.entry(r.settlement_date).or_insert(0.0) += q;
    }

    let fuel_type_stats = by_fuel
        .into_iter()
        .map(|(fuel, (total, max, count))| {
            let stats = FuelTypeStats {
                total_generation: total,
                avg_generation: total / count as f64,
                max_generation: max,
                record_count: count,
            };
            (fuel, stats)
        })
        .collect();

    let daily: Vec<f64> = by_day.into_values().collect();
    let daily_stats = DailyStats {
        avg_daily_generation: daily.iter().sum::<f64>() / daily.len() as f64,
        max_daily_generation: daily.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        min_daily_generation: daily.iter().copied().fold(f64::INFINITY, f64::min),
    };

    Ok(SummaryReport {
        total_records: records.len(),
        date_range: ReportDateRange {
            start,
            end,
            days: (end - start).whole_days() + 1,
        },
        fuel_type_stats,
        daily_stats,
    })
}
