//! `/api/v1/plots` handlers.

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use time::{macros::format_description, OffsetDateTime};
use windsolar_client::db::generation_queries::{get_data, get_data_by_date_range, GenerationFilter};

use super::{
    schemas::{GeneratePlotRequest, ReportParams},
    ApiError, AppState,
};
use crate::charts::{self, PlotType};

/// `POST /api/v1/plots/generate`: the chart as an SVG attachment.
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GeneratePlotRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let fuel_type = req.normalized_fuel_type();
    let filter = GenerationFilter {
        start_date: req.start_date,
        end_date: req.end_date,
        fuel_types: match req.plot_type {
            PlotType::Heatmap => fuel_type.clone().map(|ft| vec![ft]),
            _ => None,
        },
        limit: None,
    };
    let records = get_data(state.db.pool(), &filter).await?;

    let plot = req.plot_type;
    let title = req.title;
    let svg = tokio::task::spawn_blocking(move || {
        charts::render(plot, &records, title.as_deref(), fuel_type.as_deref())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("chart task failed: {e}")))??;

    let stamp = OffsetDateTime::now_utc()
        .format(format_description!("[year][month][day]_[hour][minute][second]"))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let filename = format!("{}_plot_{stamp}.svg", plot.as_str());

    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename={filename}")),
        ],
        svg,
    ))
}

/// `GET /api/v1/plots/report`
pub async fn report(
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Value>, ApiError> {
    let pool = state.db.pool();
    let records = match (params.start_date, params.end_date) {
        (Some(start), Some(end)) => get_data_by_date_range(pool, start, end).await?,
        (start_date, end_date) => {
            let filter = GenerationFilter {
                start_date,
                end_date,
                ..Default::default()
            };
            get_data(pool, &filter).await?
        }
    };
    let summary = charts::generate_summary_report(&records)?;

    Ok(Json(json!({ "status": "success", "summary": summary })))
}
