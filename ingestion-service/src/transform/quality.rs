use std::collections::{BTreeMap, BTreeSet};

use serde::{ser::SerializeMap, Serialize, Serializer};
use windsolar_client::domain::{ExpectedField, GenerationFields, NormalizedRecord, RawObservation};

/// Raw records inspected for missing critical fields.
pub const RAW_SAMPLE_SIZE: usize = 100;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QualityError {
    #[error("No data received")]
    NoDataReceived,
    #[error("No data to validate")]
    NothingToValidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Success,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateSpan {
    pub min: Option<String>,
    pub max: Option<String>,
}

/// Cheap summary of a freshly fetched batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawQualityReport {
    pub status: ValidationStatus,
    pub total_records: usize,
    pub fuel_types: Vec<String>,
    pub date_range: DateSpan,
    /// Critical fields absent in at least one of the first [`RAW_SAMPLE_SIZE`] records.
    pub missing_fields: Vec<ExpectedField>,
}

pub fn validate_data_quality(records: &[RawObservation]) -> Result<RawQualityReport, QualityError> {
    if records.is_empty() {
        return Err(QualityError::NoDataReceived);
    }

    let missing_fields: BTreeSet<ExpectedField> = records
        .iter()
        .take(RAW_SAMPLE_SIZE)
        .flat_map(|r| {
            ExpectedField::CRITICAL
                .into_iter()
                .filter(move |f| r.fields.is_missing(*f))
        })
        .collect();

    let fields = records.iter().map(|r| &r.fields);
    let report = RawQualityReport {
        status: ValidationStatus::Success,
        total_records: records.len(),
        fuel_types: fuel_types(fields.clone()).into_iter().collect(),
        date_range: date_span(&settlement_dates(fields)),
        missing_fields: missing_fields.into_iter().collect(),
    };

    if !report.missing_fields.is_empty() {
        tracing::warn!(fields = ?report.missing_fields, "critical fields missing in sampled records");
    }

    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MissingStat {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantityStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedDateRange {
    pub min: Option<String>,
    pub max: Option<String>,
    pub unique_dates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub status: ValidationStatus,
    pub record_count: usize,
    pub fuel_types: Vec<String>,
    pub date_range: ProcessedDateRange,
    /// Only critical fields with at least one missing value appear here.
    pub missing_stats: BTreeMap<ExpectedField, MissingStat>,
    /// Share of records with every critical field present, 0..=100, two decimals.
    pub data_quality_score: f64,
    /// `None` when no record carries a numeric quantity; serialized as `{}`.
    #[serde(serialize_with = "empty_map_when_none")]
    pub quantity_stats: Option<QuantityStats>,
    pub records_with_missing_critical: usize,
}

/// Score a normalized batch. Quantities that do not parse as numbers are left
/// out of [`QuantityStats`] but still count as present.
pub fn validate_processed_data(records: &[NormalizedRecord]) -> Result<QualityReport, QualityError> {
    if records.is_empty() {
        return Err(QualityError::NothingToValidate);
    }

    tracing::info!(records = records.len(), "validating processed records");

    let total = records.len();
    let mut missing_counts: BTreeMap<ExpectedField, usize> = BTreeMap::new();
    let mut records_with_missing_critical = 0usize;
    let mut quantities = Vec::with_capacity(total);

    for record in records {
        let mut incomplete = false;
        for field in ExpectedField::CRITICAL {
            if record.fields.is_missing(field) {
                *missing_counts.entry(field).or_insert(0) += 1;
                incomplete = true;
            }
        }
        if incomplete {
            records_with_missing_critical += 1;
        }
        if let Some(q) = record.fields.quantity.as_ref().and_then(|q| q.to_f64().ok()) {
            quantities.push(q);
        }
    }

    let fields = records.iter().map(|r| &r.fields);
    let dates = settlement_dates(fields.clone());
    let span = date_span(&dates);

    let score = round2((total - records_with_missing_critical) as f64 / total as f64 * 100.0);

    let report = QualityReport {
        status: ValidationStatus::Success,
        record_count: total,
        fuel_types: fuel_types(fields).into_iter().collect(),
        date_range: ProcessedDateRange {
            min: span.min,
            max: span.max,
            unique_dates: dates.len(),
        },
        missing_stats: missing_counts
            .into_iter()
            .map(|(field, count)| {
                let percentage = count as f64 / total as f64 * 100.0;
                (field, MissingStat { count, percentage })
            })
            .collect(),
        data_quality_score: score,
        quantity_stats: quantity_stats(&quantities),
        records_with_missing_critical,
    };

    metrics::histogram!("ingest_data_quality_score").record(score);
    tracing::info!(score = %format!("{score:.2}%"), "data validation completed");

    Ok(report)
}

fn fuel_types<'a>(fields: impl Iterator<Item = &'a GenerationFields>) -> BTreeSet<String> {
    fields
        .filter_map(|f| f.psr_type.as_deref())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn settlement_dates<'a>(fields: impl Iterator<Item = &'a GenerationFields>) -> BTreeSet<&'a str> {
    fields
        .filter_map(|f| f.settlement_date.as_deref())
        .filter(|s| !s.is_empty())
        .collect()
}

fn date_span(dates: &BTreeSet<&str>) -> DateSpan {
    DateSpan {
        min: dates.first().map(|s| s.to_string()),
        max: dates.last().map(|s| s.to_string()),
    }
}

fn quantity_stats(values: &[f64]) -> Option<QuantityStats> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = values.iter().sum();
    Some(QuantityStats {
        min,
        max,
        avg: sum / values.len() as f64,
        count: values.len(),
    })
}

fn empty_map_when_none<S: Serializer>(stats: &Option<QuantityStats>, serializer: S) -> Result<S::Ok, S::Error> {
    match stats {
        Some(stats) => stats.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// Two decimals, halves to even.
fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}
