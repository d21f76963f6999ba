//! Request and response bodies.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use windsolar_client::domain::{FuelType, StoredRecord};

use super::ApiError;
use crate::{charts::PlotType, pipeline::IngestSummary, sources::DateChunk};

pub const MAX_RETRIEVE_LIMIT: i64 = 10_000;

#[derive(Debug, Deserialize)]
pub struct FetchDataRequest {
    pub start_date: Date,
    pub end_date: Date,
}

impl FetchDataRequest {
    pub fn validate(&self, today: Date) -> Result<(), ApiError> {
        if self.end_date < self.start_date {
            return Err(ApiError::BadRequest("End date must be after start date".into()));
        }
        if self.start_date > today || self.end_date > today {
            return Err(ApiError::BadRequest("Date cannot be in the future".into()));
        }
        Ok(())
    }

    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).whole_days() + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MissingRange {
    pub start: Date,
    pub end: Date,
}

impl From<DateChunk> for MissingRange {
    fn from(c: DateChunk) -> Self {
        Self { start: c.start, end: c.end }
    }
}

#[derive(Debug, Serialize)]
pub struct FetchDataResponse {
    pub status: &'static str,
    pub message: String,
    pub records_fetched: usize,
    pub records_stored: usize,
    pub records_failed: usize,
    /// Seconds.
    pub processing_time: f64,
    pub failed_chunks: usize,
    pub missing_date_ranges: Vec<MissingRange>,
}

impl FetchDataResponse {
    pub fn processing(days: i64) -> Self {
        Self {
            status: "processing",
            message: format!("Background processing started for {days} days"),
            records_fetched: 0,
            records_stored: 0,
            records_failed: 0,
            processing_time: 0.0,
            failed_chunks: 0,
            missing_date_ranges: Vec::new(),
        }
    }

    pub fn completed(summary: &IngestSummary) -> Self {
        Self {
            status: "completed",
            message: "Data fetched and stored successfully".into(),
            records_fetched: summary.records_fetched,
            records_stored: summary.records_stored(),
            records_failed: summary.records_failed,
            processing_time: summary.processing_time.as_secs_f64(),
            failed_chunks: summary.failed_chunks,
            missing_date_ranges: summary.missing_date_ranges.iter().copied().map(MissingRange::from).collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RetrieveDataRequest {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub fuel_types: Option<Vec<FuelType>>,
    pub limit: Option<i64>,
}

impl RetrieveDataRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        match self.limit {
            Some(limit) if !(1..=MAX_RETRIEVE_LIMIT).contains(&limit) => Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {MAX_RETRIEVE_LIMIT}"
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DataRecord {
    pub settlement_date: Date,
    pub settlement_period: i64,
    pub psr_type: String,
    pub quantity: f64,
    pub fuel_type: String,
    pub region: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub publish_time: Option<OffsetDateTime>,
}

impl From<StoredRecord> for DataRecord {
    fn from(r: StoredRecord) -> Self {
        Self {
            settlement_date: r.settlement_date,
            settlement_period: r.settlement_period,
            quantity: r.quantity.unwrap_or(0.0),
            fuel_type: r
                .fuel_type
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| r.psr_type.clone()),
            psr_type: r.psr_type,
            region: r.region.filter(|s| !s.is_empty()).unwrap_or_else(|| "GB".into()),
            publish_time: r.publish_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RetrieveDataResponse {
    pub status: &'static str,
    pub count: usize,
    pub data: Vec<DataRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearParams {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct GeneratePlotRequest {
    pub plot_type: PlotType,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub fuel_type: Option<String>,
    pub title: Option<String>,
}

impl GeneratePlotRequest {
    /// Fuel type trimmed and lower-cased; blank counts as absent.
    pub fn normalized_fuel_type(&self) -> Option<String> {
        self.fuel_type
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}
