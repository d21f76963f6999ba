use std::{collections::HashSet, time::Duration};

use time::Date;
use windsolar_client::domain::RawObservation;

use super::{
    chunks::{inclusive_days, parse_date, plan_chunks, RangeError, DEFAULT_MAX_CHUNK_DAYS},
    ChunkSource, DateChunk, FetchError,
};
use crate::config::UpstreamConfig;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub max_chunk_days: u32,
    /// Pause between consecutive upstream requests.
    pub rate_limit_delay: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_chunk_days: DEFAULT_MAX_CHUNK_DAYS,
            rate_limit_delay: Duration::from_secs(1),
        }
    }
}

impl From<&UpstreamConfig> for FetchSettings {
    fn from(cfg: &UpstreamConfig) -> Self {
        Self {
            max_chunk_days: cfg.max_chunk_days,
            rate_limit_delay: cfg.rate_limit_delay(),
        }
    }
}

/// Aggregate result of a ranged fetch.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub start: Option<Date>,
    pub end: Option<Date>,
    /// Records of every chunk that did not fail, in plan order.
    pub records: Vec<RawObservation>,
    pub expected_chunks: usize,
    pub successful_chunks: usize,
    /// Successful chunks that carried no records.
    pub empty_chunks: usize,
    pub failures: Vec<(DateChunk, FetchError)>,
}

impl FetchOutcome {
    pub fn failed_chunks(&self) -> usize {
        self.failures.len()
    }

    /// Date runs inside the requested range for which no record arrived.
    pub fn missing_date_ranges(&self) -> Vec<DateChunk> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => failed_date_ranges(start, end, &self.records),
            _ => Vec::new(),
        }
    }
}

/// Fetch `[start_date, end_date]` (both `YYYY-MM-DD`) chunk by chunk.
///
/// Chunks run strictly one after another with `rate_limit_delay` between
/// them. A failing chunk is recorded in [`FetchOutcome::failures`] and the
/// remaining chunks still run; only an invalid range aborts the call.
pub async fn fetch_generation_data<S>(
    source: &S,
    start_date: &str,
    end_date: &str,
    settings: &FetchSettings,
) -> Result<FetchOutcome, RangeError>
where
    S: ChunkSource + ?Sized,
{
    let start = parse_date(start_date)?;
    let end = parse_date(end_date)?;
    let mut chunks = plan_chunks(start, end, settings.max_chunk_days)?.peekable();

    let total_days = inclusive_days(start, end);
    let chunk_days = i64::from(settings.max_chunk_days);
    let expected_chunks = ((total_days + chunk_days - 1) / chunk_days) as usize;

    tracing::info!(%start, %end, total_days, expected_chunks, "starting data fetch");

    let mut outcome = FetchOutcome {
        start: Some(start),
        end: Some(end),
        expected_chunks,
        ..Default::default()
    };

    let mut chunk_num = 0usize;
    while let Some(chunk) = chunks.next() {
        chunk_num += 1;
        tracing::info!(chunk = chunk_num, expected_chunks, %chunk, "processing chunk");

        match source.fetch_chunk(chunk).await {
            Ok(records) => {
                outcome.successful_chunks += 1;
                metrics::counter!("ingest_chunks_fetched_total").increment(1);
                if records.is_empty() {
                    outcome.empty_chunks += 1;
                    tracing::warn!(chunk = chunk_num, %chunk, "chunk returned no data");
                }
                outcome.records.extend(records);
                tracing::info!(chunk = chunk_num, total_records = outcome.records.len(), "chunk successful");
            }
            Err(e) => {
                metrics::counter!("ingest_chunks_failed_total").increment(1);
                tracing::error!(chunk = chunk_num, %chunk, error = %e, "chunk failed");
                outcome.failures.push((chunk, e));
            }
        }

        if chunks.peek().is_some() && !settings.rate_limit_delay.is_zero() {
            tokio::time::sleep(settings.rate_limit_delay).await;
        }
    }

    tracing::info!(
        total_records = outcome.records.len(),
        successful_chunks = outcome.successful_chunks,
        failed_chunks = outcome.failed_chunks(),
        "data fetch completed"
    );

    Ok(outcome)
}

/// Maximal runs of dates in `[start, end]` that no record's settlement date covers.
pub fn failed_date_ranges(start: Date, end: Date, records: &[RawObservation]) -> Vec<DateChunk> {
    if start > end {
        return Vec::new();
    }

    let seen: HashSet<Date> = records
        .iter()
        .filter_map(|r| r.fields.settlement_date.as_deref())
        .filter_map(|s| parse_date(s).ok())
        .collect();

    let mut ranges = Vec::new();
    let mut open: Option<DateChunk> = None;
    let mut day = Some(start);

    while let Some(current) = day.filter(|d| *d <= end) {
        if seen.contains(&current) {
            ranges.extend(open.take());
        } else {
            match open.as_mut() {
                Some(run) => run.end = current,
                None => {
                    open = Some(DateChunk {
                        start: current,
                        end: current,
                    })
                }
            }
        }
        day = current.next_day();
    }
    ranges.extend(open);

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use time::macros::date;
    use windsolar_client::domain::GenerationFields;

    /// Emits one record per day of the chunk; chunks whose start is listed in
    /// `failing` raise instead, and those in `empty` return nothing.
    #[derive(Default)]
    struct ScriptedSource {
        failing: Vec<Date>,
        empty: Vec<Date>,
        calls: Mutex<Vec<DateChunk>>,
    }

    #[async_trait::async_trait]
    impl ChunkSource for ScriptedSource {
        async fn fetch_chunk(&self, chunk: DateChunk) -> Result<Vec<RawObservation>, FetchError> {
            self.calls.lock().unwrap().push(chunk);
            if self.failing.contains(&chunk.start) {
                return Err(FetchError::Status {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                });
            }
            if self.empty.contains(&chunk.start) {
                return Ok(Vec::new());
            }

            let mut out = Vec::new();
            let mut day = Some(chunk.start);
            while let Some(d) = day.filter(|d| *d <= chunk.end) {
                out.push(observation(&d.to_string()));
                day = d.next_day();
            }
            Ok(out)
        }
    }

    fn observation(settlement_date: &str) -> RawObservation {
        RawObservation {
            fields: GenerationFields {
                psr_type: Some("Solar".into()),
                settlement_date: Some(settlement_date.into()),
                settlement_period: Some(1),
                quantity: Some(1.0.into()),
                ..Default::default()
            },
            extra: Default::default(),
        }
    }

    fn no_delay() -> FetchSettings {
        FetchSettings {
            rate_limit_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn concatenates_chunks_in_plan_order() {
        let source = ScriptedSource::default();
        let outcome = fetch_generation_data(&source, "2024-01-01", "2024-01-14", &no_delay())
            .await
            .unwrap();

        assert_eq!(outcome.expected_chunks, 3);
        assert_eq!(outcome.successful_chunks, 3);
        assert_eq!(outcome.failed_chunks(), 0);
        assert_eq!(outcome.records.len(), 14);

        let dates: Vec<_> = outcome
            .records
            .iter()
            .map(|r| r.fields.settlement_date.clone().unwrap())
            .collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
        assert!(outcome.missing_date_ranges().is_empty());
    }

    #[tokio::test]
    async fn failed_chunk_is_tallied_and_the_rest_continue() {
        let source = ScriptedSource {
            failing: vec![date!(2024 - 01 - 07)],
            ..Default::default()
        };
        let outcome = fetch_generation_data(&source, "2024-01-01", "2024-01-14", &no_delay())
            .await
            .unwrap();

        assert_eq!(source.calls.lock().unwrap().len(), 3);
        assert_eq!(outcome.successful_chunks, 2);
        assert_eq!(outcome.failed_chunks(), 1);
        assert_eq!(outcome.failures[0].0.start, date!(2024 - 01 - 07));
        assert_eq!(outcome.records.len(), 6 + 2);
        assert_eq!(
            outcome.missing_date_ranges(),
            vec![DateChunk {
                start: date!(2024 - 01 - 07),
                end: date!(2024 - 01 - 12),
            }]
        );
    }

    #[tokio::test]
    async fn empty_chunk_counts_as_successful() {
        let source = ScriptedSource {
            empty: vec![date!(2024 - 01 - 01)],
            ..Default::default()
        };
        let outcome = fetch_generation_data(&source, "2024-01-01", "2024-01-03", &no_delay())
            .await
            .unwrap();

        assert_eq!(outcome.successful_chunks, 1);
        assert_eq!(outcome.empty_chunks, 1);
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn invalid_ranges_are_rejected_before_any_fetch() {
        let source = ScriptedSource::default();

        let err = fetch_generation_data(&source, "2024-01-05", "2024-01-01", &no_delay())
            .await
            .unwrap_err();
        assert!(matches!(err, RangeError::InvalidRange { .. }));

        let err = fetch_generation_data(&source, "2024/01/01", "2024-01-02", &no_delay())
            .await
            .unwrap_err();
        assert_eq!(err, RangeError::InvalidDate("2024/01/01".into()));

        assert!(source.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pauses_between_chunks_but_not_after_the_last() {
        let source = ScriptedSource::default();
        let settings = FetchSettings {
            max_chunk_days: 1,
            rate_limit_delay: Duration::from_millis(30),
        };

        let started = std::time::Instant::now();
        let outcome = fetch_generation_data(&source, "2024-01-01", "2024-01-03", &settings)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(outcome.successful_chunks, 3);
        assert!(elapsed >= Duration::from_millis(60), "{elapsed:?}");
    }

    #[test]
    fn failed_date_ranges_finds_gaps() {
        let records = vec![observation("2024-01-02"), observation("2024-01-05")];
        let ranges = failed_date_ranges(date!(2024 - 01 - 01), date!(2024 - 01 - 06), &records);
        assert_eq!(
            ranges,
            vec![
                DateChunk {
                    start: date!(2024 - 01 - 01),
                    end: date!(2024 - 01 - 01)
                },
                DateChunk {
                    start: date!(2024 - 01 - 03),
                    end: date!(2024 - 01 - 04)
                },
                DateChunk {
                    start: date!(2024 - 01 - 06),
                    end: date!(2024 - 01 - 06)
                },
            ]
        );

        let whole = failed_date_ranges(date!(2024 - 01 - 01), date!(2024 - 01 - 03), &[]);
        assert_eq!(
            whole,
            vec![DateChunk {
                start: date!(2024 - 01 - 01),
                end: date!(2024 - 01 - 03)
            }]
        );
    }
}
