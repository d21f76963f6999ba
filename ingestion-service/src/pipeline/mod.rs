//! fetch -> raw gate -> deduplicate -> normalize -> processed gate -> upsert.

use std::time::{Duration, Instant};

use crate::{
    sinks::{RecordSink, StoreError},
    sources::{fetch_generation_data, ChunkSource, DateChunk, FetchSettings, RangeError},
    transform::{
        deduplicate_data, handle_missing_fields, validate_data_quality, validate_processed_data, QualityError,
        QualityReport, RawQualityReport,
    },
};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("no data retrieved from upstream ({failed_chunks} chunk(s) failed)")]
    NoData { failed_chunks: usize },
    #[error("data quality check failed: {0}")]
    Quality(#[from] QualityError),
    #[error("failed to store data: {0}")]
    Store(#[from] StoreError),
}

/// What one ingestion run did.
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub records_fetched: usize,
    pub unique_records: usize,
    pub records_inserted: usize,
    pub records_updated: usize,
    pub records_failed: usize,
    pub successful_chunks: usize,
    pub failed_chunks: usize,
    pub empty_chunks: usize,
    pub missing_date_ranges: Vec<DateChunk>,
    pub raw_quality: RawQualityReport,
    pub quality: QualityReport,
    pub processing_time: Duration,
}

impl IngestSummary {
    pub fn records_stored(&self) -> usize {
        self.records_inserted + self.records_updated
    }
}

pub struct Pipeline<S, K> {
    pub source: S,
    pub sink: K,
    pub settings: FetchSettings,
}

impl<S, K> Pipeline<S, K>
where
    S: ChunkSource,
    K: RecordSink,
{
    pub fn new(source: S, sink: K, settings: FetchSettings) -> Self {
        Self { source, sink, settings }
    }

    /// Ingest `[start_date, end_date]` end to end.
    ///
    /// Chunk failures are reported in the summary rather than aborting the
    /// run; it fails only when nothing arrived at all, a quality gate rejects
    /// the batch, or the store itself is unusable.
    pub async fn run(&self, start_date: &str, end_date: &str) -> Result<IngestSummary, PipelineError> {
        let started = Instant::now();
        tracing::info!(start_date, end_date, "starting ingestion run");

        let fetched = fetch_generation_data(&self.source, start_date, end_date, &self.settings).await?;
        if fetched.records.is_empty() {
            return Err(PipelineError::NoData {
                failed_chunks: fetched.failed_chunks(),
            });
        }

        let raw_quality = validate_data_quality(&fetched.records)?;
        let missing_date_ranges = fetched.missing_date_ranges();
        let records_fetched = fetched.records.len();

        let unique = deduplicate_data(fetched.records);
        let unique_records = unique.len();
        let normalized = handle_missing_fields(unique);
        let quality = validate_processed_data(&normalized.records)?;

        let report = self.sink.upsert(&normalized.records).await?;

        let summary = IngestSummary {
            records_fetched,
            unique_records,
            records_inserted: report.inserted,
            records_updated: report.updated,
            records_failed: report.failed(),
            successful_chunks: fetched.successful_chunks,
            failed_chunks: fetched.failures.len(),
            empty_chunks: fetched.empty_chunks,
            missing_date_ranges,
            raw_quality,
            quality,
            processing_time: started.elapsed(),
        };

        metrics::histogram!("ingest_run_duration_seconds").record(summary.processing_time.as_secs_f64());
        tracing::info!(
            fetched = summary.records_fetched,
            stored = summary.records_stored(),
            failed = summary.records_failed,
            failed_chunks = summary.failed_chunks,
            quality_score = summary.quality.data_quality_score,
            elapsed_ms = summary.processing_time.as_millis() as u64,
            "ingestion run completed"
        );

        Ok(summary)
    }
}
