mod common;

use reqwest::{header, StatusCode};
use serde_json::{json, Value};
use windsolar_client::db::Database;
use windsolar_ingestion::{
    api::{self, AppState},
    config::AppConfig,
};

use common::{client, fast_settings, spawn, spawn_upstream};

struct TestApp {
    base: String,
    http: reqwest::Client,
}

impl TestApp {
    async fn start() -> Self {
        let db = Database::connect_in_memory().await.unwrap();
        let upstream = client(spawn_upstream(Vec::new()).await);

        let mut state = AppState::new(db, upstream, &AppConfig::default());
        state.fetch_settings = fast_settings();

        Self {
            base: spawn(api::router(state)).await,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.http.post(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http.get(self.url(path)).send().await.unwrap()
    }

    async fn seed(&self) {
        let res = self
            .post("/api/v1/data/fetch", json!({ "start_date": "2024-01-01", "end_date": "2024-01-03" }))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn root_and_health_respond() {
    let app = TestApp::start().await;

    let root: Value = app.get("/").await.json().await.unwrap();
    assert_eq!(root["message"], json!(api::SERVICE_NAME));

    let res = app.get("/health").await;
    assert_eq!(res.status(), StatusCode::OK);
    let health: Value = res.json().await.unwrap();
    assert_eq!(health["status"], json!("healthy"));
    assert_eq!(health["total_records"], json!(0));
}

#[tokio::test]
async fn fetch_ingests_and_reports() {
    let app = TestApp::start().await;

    let res = app
        .post("/api/v1/data/fetch", json!({ "start_date": "2024-01-01", "end_date": "2024-01-03" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], json!("completed"));
    assert_eq!(body["records_fetched"], json!(21));
    assert_eq!(body["records_stored"], json!(18));
    assert_eq!(body["failed_chunks"], json!(0));
    assert_eq!(body["missing_date_ranges"], json!([]));
}

#[tokio::test]
async fn fetch_rejects_bad_ranges() {
    let app = TestApp::start().await;

    let res = app
        .post("/api/v1/data/fetch", json!({ "start_date": "2024-01-05", "end_date": "2024-01-01" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .post("/api/v1/data/fetch", json!({ "start_date": "2024-01-01", "end_date": "2999-01-01" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn long_fetch_runs_in_background() {
    let app = TestApp::start().await;

    let res = app
        .post("/api/v1/data/fetch", json!({ "start_date": "2024-01-01", "end_date": "2024-02-29" }))
        .await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], json!("processing"));
    assert_eq!(body["message"], json!("Background processing started for 60 days"));
}

#[tokio::test]
async fn retrieve_filters_by_fuel_type_and_limit() {
    let app = TestApp::start().await;
    app.seed().await;

    let body: Value = app
        .post("/api/v1/data/retrieve", json!({ "fuel_types": ["Solar"] }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["count"], json!(6));
    let first = &body["data"][0];
    assert_eq!(first["psr_type"], json!("Solar"));
    assert_eq!(first["region"], json!("GB"));
    assert_eq!(first["settlement_date"], json!("2024-01-01"));
    assert_eq!(first["quantity"], json!(101.0));

    let body: Value = app
        .post("/api/v1/data/retrieve", json!({ "limit": 4 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], json!(4));

    let res = app.post("/api/v1/data/retrieve", json!({ "limit": 0 })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn summary_breaks_down_fuel_types() {
    let app = TestApp::start().await;
    app.seed().await;

    let body: Value = app.get("/api/v1/data/summary").await.json().await.unwrap();
    assert_eq!(body["total_records"], json!(18));
    assert_eq!(body["unique_dates"], json!(3));
    assert_eq!(body["fuel_type_breakdown"].as_array().unwrap().len(), 3);
    assert_eq!(body["date_range"]["min"], json!("2024-01-01"));
    assert_eq!(body["date_range"]["max"], json!("2024-01-03"));
}

#[tokio::test]
async fn clear_requires_confirmation() {
    let app = TestApp::start().await;
    app.seed().await;

    let res = app.http.delete(app.url("/api/v1/data/clear")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app
        .http
        .delete(app.url("/api/v1/data/clear?confirm=true"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["deleted_count"], json!(18));
    assert_eq!(body["message"], json!("Cleared 18 records"));
}

#[tokio::test]
async fn plots_are_svg_attachments() {
    let app = TestApp::start().await;
    app.seed().await;

    let res = app.post("/api/v1/plots/generate", json!({ "plot_type": "daily" })).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "image/svg+xml");
    let disposition = res.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment; filename=daily_plot_"), "{disposition}");
    assert!(disposition.ends_with(".svg"));
    assert!(res.text().await.unwrap().contains("<svg"));

    let res = app
        .post("/api/v1/plots/generate", json!({ "plot_type": "heatmap", "fuel_type": "wind onshore" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn plots_and_report_without_data_are_not_found() {
    let app = TestApp::start().await;

    let res = app.post("/api/v1/plots/generate", json!({ "plot_type": "monthly" })).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app.get("/api/v1/plots/report").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], json!("No data available"));
}

#[tokio::test]
async fn report_summarises_stored_range() {
    let app = TestApp::start().await;
    app.seed().await;

    let body: Value = app
        .get("/api/v1/plots/report?start_date=2024-01-02&end_date=2024-01-03")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["summary"]["total_records"], json!(12));
    assert_eq!(body["summary"]["date_range"]["days"], json!(2));
    assert_eq!(body["summary"]["fuel_type_stats"]["Solar"]["record_count"], json!(4));
}
