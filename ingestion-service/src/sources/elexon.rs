//! Chunk fetcher for the BMRS "actual generation per type, wind and solar" API.

use std::{collections::BTreeMap, time::Duration};

use reqwest::{header::ACCEPT, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use windsolar_client::domain::{GenerationFields, Quantity, RawObservation};

use super::{chunks::RangeError, ChunkSource, DateChunk};
use crate::config::UpstreamConfig;

/// Hard upstream limit on the span of a single request.
pub const MAX_REQUEST_DAYS: i64 = 7;

const SETTLEMENT_PERIOD_FROM: &str = "1";
const SETTLEMENT_PERIOD_TO: &str = "50";
const FORMAT: &str = "json";
const DEFAULT_REGION: &str = "GB";

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("request error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("HTTP error {status}")]
    Status { status: StatusCode },
    #[error("invalid response payload: {0}")]
    Decode(#[source] serde_json::Error),
}

impl FetchError {
    /// Network failures and non-success statuses are worth another attempt;
    /// bad ranges and undecodable payloads are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transport(_) | FetchError::Status { .. })
    }
}

/// Exponential backoff: `multiplier * 2^(attempt - 1)`, clamped to
/// `[min_delay, max_delay]`, for at most `max_attempts` attempts in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier: Duration::from_secs(1),
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.multiplier
            .saturating_mul(factor)
            .max(self.min_delay)
            .min(self.max_delay)
    }
}

#[derive(Deserialize)]
struct UpstreamPayload {
    #[serde(default)]
    data: Option<Vec<Value>>,
}

/// Map one element of the upstream `data` array.
///
/// Known fields holding a value of the wrong shape are treated as missing so
/// the record still reaches the quality gates. Unknown keys land in `extra`.
/// Elements that are not objects are dropped.
fn map_upstream_record(index: usize, value: Value) -> Option<RawObservation> {
    let Value::Object(object) = value else {
        tracing::warn!(index, "skipping upstream record that is not a JSON object");
        metrics::counter!("upstream_records_unmappable_total").increment(1);
        return None;
    };

    let mut fields = GenerationFields::default();
    let mut extra = BTreeMap::new();
    let mut rejected = Vec::new();

    for (key, value) in object {
        let accepted = match key.as_str() {
            "publishTime" => assign(&mut fields.publish_time, &value, as_text),
            "businessType" => assign(&mut fields.business_type, &value, as_text),
            "psrType" => assign(&mut fields.psr_type, &value, as_text),
            "quantity" => assign(&mut fields.quantity, &value, as_quantity),
            "startTime" => assign(&mut fields.start_time, &value, as_text),
            "settlementDate" => assign(&mut fields.settlement_date, &value, as_text),
            "settlementPeriod" => assign(&mut fields.settlement_period, &value, as_period),
            // derived below
            "fuelType" | "region" => true,
            _ => {
                extra.insert(key, value);
                continue;
            }
        };
        if !accepted {
            rejected.push(key);
        }
    }

    if !rejected.is_empty() {
        metrics::counter!("upstream_fields_rejected_total").increment(rejected.len() as u64);
        tracing::warn!(index, fields = ?rejected, "upstream record has values of unexpected type, treating them as missing");
    }

    fields.fuel_type = fields.psr_type.clone();
    fields.region = Some(DEFAULT_REGION.to_string());

    Some(RawObservation { fields, extra })
}

/// `null` clears the slot; anything `coerce` rejects clears it and reports `false`.
fn assign<T>(slot: &mut Option<T>, value: &Value, coerce: fn(&Value) -> Option<T>) -> bool {
    if value.is_null() {
        *slot = None;
        return true;
    }
    *slot = coerce(value);
    slot.is_some()
}

fn as_text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn as_quantity(value: &Value) -> Option<Quantity> {
    match value {
        Value::Number(n) => n.as_f64().map(Quantity::Number),
        Value::String(s) => Some(Quantity::Text(s.clone())),
        _ => None,
    }
}

fn as_period(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn ensure_within_request_limit(chunk: &DateChunk) -> Result<(), RangeError> {
    if chunk.start > chunk.end {
        return Err(RangeError::InvalidRange {
            start: chunk.start,
            end: chunk.end,
        });
    }
    let days = chunk.days();
    if days > MAX_REQUEST_DAYS {
        return Err(RangeError::RangeTooLarge {
            days,
            max_days: MAX_REQUEST_DAYS,
        });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ElexonClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ElexonClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            retry,
        })
    }

    pub fn from_config(cfg: &UpstreamConfig) -> Result<Self, FetchError> {
        Self::new(cfg.base_url.clone(), cfg.request_timeout(), cfg.retry_policy())
    }

    async fn fetch_once(&self, chunk: DateChunk) -> Result<Vec<RawObservation>, FetchError> {
        let from = chunk.start.to_string();
        let to = chunk.end.to_string();

        let response = self
            .http
            .get(&self.base_url)
            .header(ACCEPT, "application/json")
            .query(&[
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("settlementPeriodFrom", SETTLEMENT_PERIOD_FROM),
                ("settlementPeriodTo", SETTLEMENT_PERIOD_TO),
                ("format", FORMAT),
            ])
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status });
        }

        let body = response.bytes().await.map_err(FetchError::Transport)?;
        let payload: UpstreamPayload = serde_json::from_slice(&body).map_err(FetchError::Decode)?;

        Ok(payload
            .data
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| map_upstream_record(index, value))
            .collect())
    }
}

#[async_trait::async_trait]
impl ChunkSource for ElexonClient {
    async fn fetch_chunk(&self, chunk: DateChunk) -> Result<Vec<RawObservation>, FetchError> {
        if let Err(e) = ensure_within_request_limit(&chunk) {
            tracing::error!(error = %e, %chunk, "refusing to fetch chunk");
            return Err(e.into());
        }

        tracing::info!(%chunk, days = chunk.days(), "fetching generation data");

        let mut attempt: u32 = 1;
        loop {
            match self.fetch_once(chunk).await {
                Ok(records) => {
                    metrics::counter!("upstream_records_fetched_total").increment(records.len() as u64);
                    tracing::info!(%chunk, records = records.len(), "fetched chunk");
                    return Ok(records);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let sleep_for = self.retry.delay_after(attempt);
                    metrics::counter!("upstream_fetch_retries_total").increment(1);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        backoff_ms = sleep_for.as_millis() as u64,
                        "upstream fetch failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, attempt, %chunk, "upstream fetch failed, giving up");
                    return Err(e);
                }
            }
        }
    }
}
