//! HTTP surface over the ingestion pipeline and the generation store.
//!
//! | Method   | Path                         |
//! |----------|------------------------------|
//! | `GET`    | `/`, `/health`               |
//! | `POST`   | `/api/v1/data/fetch`         |
//! | `POST`   | `/api/v1/data/retrieve`      |
//! | `GET`    | `/api/v1/data/summary`       |
//! | `DELETE` | `/api/v1/data/clear`         |
//! | `POST`   | `/api/v1/plots/generate`     |
//! | `GET`    | `/api/v1/plots/report`       |

pub mod data;
pub mod error;
pub mod plots;
pub mod schemas;

pub use error::ApiError;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use windsolar_client::db::{generation_queries::count_records, Database};

use crate::{
    config::AppConfig,
    pipeline::Pipeline,
    sinks::SqliteGenerationStore,
    sources::{ElexonClient, FetchSettings},
};

pub const SERVICE_NAME: &str = "Wind & Solar Data Pipeline API";

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub upstream: ElexonClient,
    pub fetch_settings: FetchSettings,
    pub background_threshold_days: i64,
}

impl AppState {
    pub fn new(db: Database, upstream: ElexonClient, cfg: &AppConfig) -> Self {
        Self {
            db,
            upstream,
            fetch_settings: FetchSettings::from(&cfg.upstream),
            background_threshold_days: cfg.server.background_threshold_days,
        }
    }

    pub fn store(&self) -> SqliteGenerationStore {
        SqliteGenerationStore::new(self.db.clone())
    }

    pub fn pipeline(&self) -> Pipeline<ElexonClient, SqliteGenerationStore> {
        Pipeline::new(self.upstream.clone(), self.store(), self.fetch_settings.clone())
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/data/fetch", post(data::fetch))
        .route("/data/retrieve", post(data::retrieve))
        .route("/data/summary", get(data::summary))
        .route("/data/clear", delete(data::clear))
        .route("/plots/generate", post(plots::generate))
        .route("/plots/report", get(plots::report));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(state)
}

pub(crate) fn timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match count_records(state.db.pool()).await {
        Ok(total) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "total_records": total, "timestamp": timestamp() })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": e.to_string(), "timestamp": timestamp() })),
            )
        }
    }
}
