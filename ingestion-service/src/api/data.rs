//! `/api/v1/data` handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use serde_json::{json, Value};
use time::OffsetDateTime;
use windsolar_client::db::generation_queries::{get_data, get_summary_stats, GenerationFilter, SummaryStats};

use super::{
    schemas::{ClearParams, DataRecord, FetchDataRequest, FetchDataResponse, RetrieveDataRequest, RetrieveDataResponse},
    ApiError, AppState,
};
use crate::sinks::RecordSink;

/// `POST /api/v1/data/fetch`
///
/// Ranges longer than the configured threshold are ingested in a background
/// task and answered straight away with status `processing`.
pub async fn fetch(
    State(state): State<AppState>,
    Json(req): Json<FetchDataRequest>,
) -> Result<Json<FetchDataResponse>, ApiError> {
    req.validate(OffsetDateTime::now_utc().date())?;
    metrics::counter!("api_fetch_requests_total").increment(1);

    let days = req.days();
    let start = req.start_date.to_string();
    let end = req.end_date.to_string();
    let pipeline = state.pipeline();

    if days > state.background_threshold_days {
        tracing::info!(%start, %end, days, "running ingestion in background");
        tokio::spawn(async move {
            match pipeline.run(&start, &end).await {
                Ok(summary) => tracing::info!(
                    %start,
                    %end,
                    stored = summary.records_stored(),
                    failed_chunks = summary.failed_chunks,
                    "background ingestion completed"
                ),
                Err(e) => tracing::error!(%start, %end, error = %e, "background ingestion failed"),
            }
        });
        return Ok(Json(FetchDataResponse::processing(days)));
    }

    let summary = pipeline.run(&start, &end).await?;
    Ok(Json(FetchDataResponse::completed(&summary)))
}

/// `POST /api/v1/data/retrieve`
pub async fn retrieve(
    State(state): State<AppState>,
    Json(req): Json<RetrieveDataRequest>,
) -> Result<Json<RetrieveDataResponse>, ApiError> {
    req.validate()?;

    let filter = GenerationFilter {
        start_date: req.start_date,
        end_date: req.end_date,
        fuel_types: req
            .fuel_types
            .map(|fts| fts.iter().map(|ft| ft.as_str().to_string()).collect()),
        limit: req.limit,
    };
    let data: Vec<DataRecord> = get_data(state.db.pool(), &filter)
        .await?
        .into_iter()
        .map(DataRecord::from)
        .collect();

    Ok(Json(RetrieveDataResponse {
        status: "success",
        count: data.len(),
        data,
    }))
}

/// `GET /api/v1/data/summary`
pub async fn summary(State(state): State<AppState>) -> Result<Json<SummaryStats>, ApiError> {
    Ok(Json(get_summary_stats(state.db.pool()).await?))
}

/// `DELETE /api/v1/data/clear?confirm=true`
pub async fn clear(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Result<Json<Value>, ApiError> {
    if !params.confirm {
        return Err(ApiError::BadRequest("Must set confirm=true to clear data".into()));
    }

    let deleted = state.store().clear_all().await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Cleared {deleted} records"),
        "deleted_count": deleted,
        "timestamp": super::timestamp(),
    })))
}
