use std::net::SocketAddr;

use anyhow::Result;
use windsolar_client::db::Database;
use windsolar_ingestion::{
    api::{self, AppState},
    config::AppConfig,
    metrics_server, observability,
    sources::ElexonClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AppConfig::load()?;
    observability::init_tracing(&cfg.logging.level);

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr).await?;
    }

    let db = Database::connect(&cfg.database.url, cfg.database.max_connections).await?;
    let upstream = ElexonClient::from_config(&cfg.upstream)?;
    let app = api::router(AppState::new(db.clone(), upstream, &cfg));

    let addr: SocketAddr = cfg
        .server
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid server.bind_addr '{}': {e}", cfg.server.bind_addr))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, service = api::SERVICE_NAME, "listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    db.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
