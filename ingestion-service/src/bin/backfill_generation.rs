use anyhow::{bail, Result};
use std::env;
use windsolar_client::db::Database;
use windsolar_ingestion::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::SqliteGenerationStore,
    sources::{ElexonClient, FetchSettings},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: backfill_generation <start YYYY-MM-DD> <end YYYY-MM-DD>");
    }
    let (start, end) = (&args[1], &args[2]);

    // INGESTION_CONFIG may point at a backfill-specific file.
    let cfg = AppConfig::load()?;
    observability::init_tracing(&cfg.logging.level);

    let db = Database::connect(&cfg.database.url, cfg.database.max_connections).await?;
    let pipeline = Pipeline::new(
        ElexonClient::from_config(&cfg.upstream)?,
        SqliteGenerationStore::new(db.clone()),
        FetchSettings::from(&cfg.upstream),
    );

    let result = pipeline.run(start, end).await;
    db.close().await;
    let summary = result?;

    tracing::info!(
        fetched = summary.records_fetched,
        unique = summary.unique_records,
        inserted = summary.records_inserted,
        updated = summary.records_updated,
        failed = summary.records_failed,
        failed_chunks = summary.failed_chunks,
        quality_score = summary.quality.data_quality_score,
        "backfill finished"
    );
    for range in &summary.missing_date_ranges {
        tracing::warn!(%range, "no data received for range");
    }

    Ok(())
}
