//! Fake BMRS upstream shared by the integration tests.

#![allow(dead_code)]

use std::{collections::HashMap, time::Duration};

use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::{json, Value};
use time::{macros::format_description, Date};
use windsolar_ingestion::sources::{ElexonClient, FetchSettings, RetryPolicy};

pub const FUELS: [&str; 3] = ["Solar", "Wind Offshore", "Wind Onshore"];
pub const PERIODS: i64 = 2;

fn parse(s: &str) -> Option<Date> {
    Date::parse(s, format_description!("[year]-[month]-[day]")).ok()
}

/// Two settlement periods per fuel per day, plus a stale duplicate of the
/// first record of each day. Quantity encodes the period.
fn day_records(day: Date) -> Vec<Value> {
    let mut out = Vec::new();
    for fuel in FUELS {
        for period in 1..=PERIODS {
            out.push(json!({
                "publishTime": format!("{day}T06:00:00Z"),
                "businessType": "Wind generation",
                "psrType": fuel,
                "quantity": 100.0 + period as f64,
                "startTime": format!("{day}T00:00:00Z"),
                "settlementDate": day.to_string(),
                "settlementPeriod": period
            }));
        }
    }
    out.push(json!({
        "publishTime": format!("{day}T01:00:00Z"),
        "psrType": FUELS[0],
        "quantity": 1.0,
        "settlementDate": day.to_string(),
        "settlementPeriod": 1
    }));
    out
}

/// Serves every day in `[from, to]`; chunks starting on a date in `failing`
/// answer 500.
pub async fn spawn_upstream(failing: Vec<Date>) -> String {
    let app = Router::new().route(
        "/generation",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let failing = failing.clone();
            async move {
                let from = params.get("from").and_then(|s| parse(s));
                let to = params.get("to").and_then(|s| parse(s));
                let (Some(from), Some(to)) = (from, to) else {
                    return StatusCode::BAD_REQUEST.into_response();
                };
                if failing.contains(&from) {
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }

                let mut data = Vec::new();
                let mut day = Some(from);
                while let Some(d) = day.filter(|d| *d <= to) {
                    data.extend(day_records(d));
                    day = d.next_day();
                }
                Json(json!({ "data": data })).into_response()
            }
        }),
    );

    format!("{}/generation", spawn(app).await)
}

pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app.into_make_service()).await;
    });
    format!("http://{addr}")
}

pub fn client(base_url: String) -> ElexonClient {
    let retry = RetryPolicy {
        max_attempts: 2,
        multiplier: Duration::from_millis(1),
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
    };
    ElexonClient::new(base_url, Duration::from_secs(5), retry).unwrap()
}

pub fn fast_settings() -> FetchSettings {
    FetchSettings {
        max_chunk_days: 6,
        rate_limit_delay: Duration::ZERO,
    }
}
