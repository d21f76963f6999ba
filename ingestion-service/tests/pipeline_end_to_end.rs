mod common;

use time::macros::date;
use windsolar_client::db::{
    generation_queries::{count_records, get_data, get_fuel_type_data, GenerationFilter},
    Database,
};
use windsolar_ingestion::{
    pipeline::{Pipeline, PipelineError},
    sinks::SqliteGenerationStore,
    sources::DateChunk,
};

use common::{client, fast_settings, spawn_upstream, FUELS, PERIODS};

#[tokio::test]
async fn ingests_a_range_into_the_store() {
    let db = Database::connect_in_memory().await.unwrap();
    let upstream = spawn_upstream(Vec::new()).await;
    let pipeline = Pipeline::new(client(upstream), SqliteGenerationStore::new(db.clone()), fast_settings());

    let summary = pipeline.run("2024-01-01", "2024-01-10").await.unwrap();

    let per_day = FUELS.len() * PERIODS as usize;
    assert_eq!(summary.successful_chunks, 2);
    assert_eq!(summary.failed_chunks, 0);
    assert_eq!(summary.records_fetched, 10 * (per_day + 1));
    assert_eq!(summary.unique_records, 10 * per_day);
    assert_eq!(summary.records_inserted, 10 * per_day);
    assert_eq!(summary.records_failed, 0);
    assert_eq!(summary.quality.data_quality_score, 100.0);
    assert_eq!(summary.quality.fuel_types, FUELS.to_vec());
    assert!(summary.missing_date_ranges.is_empty());

    assert_eq!(count_records(db.pool()).await.unwrap(), (10 * per_day) as i64);

    // The stale duplicate lost to the later publication.
    let solar = get_fuel_type_data(db.pool(), "Solar", None).await.unwrap();
    assert!(solar.iter().all(|r| r.quantity != Some(1.0)));
    assert_eq!(solar.len(), 10 * PERIODS as usize);
}

#[tokio::test]
async fn re_ingesting_updates_in_place() {
    let db = Database::connect_in_memory().await.unwrap();
    let upstream = spawn_upstream(Vec::new()).await;
    let pipeline = Pipeline::new(client(upstream), SqliteGenerationStore::new(db.clone()), fast_settings());

    let first = pipeline.run("2024-02-01", "2024-02-03").await.unwrap();
    let second = pipeline.run("2024-02-01", "2024-02-03").await.unwrap();

    assert_eq!(first.records_inserted, 18);
    assert_eq!(second.records_inserted, 0);
    assert_eq!(second.records_updated, 18);
    assert_eq!(count_records(db.pool()).await.unwrap(), 18);
}

#[tokio::test]
async fn failed_chunk_leaves_a_reported_gap() {
    let db = Database::connect_in_memory().await.unwrap();
    let upstream = spawn_upstream(vec![date!(2024 - 01 - 07)]).await;
    let pipeline = Pipeline::new(client(upstream), SqliteGenerationStore::new(db.clone()), fast_settings());

    let summary = pipeline.run("2024-01-01", "2024-01-10").await.unwrap();

    assert_eq!(summary.successful_chunks, 1);
    assert_eq!(summary.failed_chunks, 1);
    assert_eq!(
        summary.missing_date_ranges,
        vec![DateChunk {
            start: date!(2024 - 01 - 07),
            end: date!(2024 - 01 - 10),
        }]
    );

    let stored = get_data(
        db.pool(),
        &GenerationFilter {
            start_date: Some(date!(2024 - 01 - 07)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(stored.is_empty());
    assert_eq!(count_records(db.pool()).await.unwrap(), 36);
}

#[tokio::test]
async fn every_chunk_failing_is_no_data() {
    let db = Database::connect_in_memory().await.unwrap();
    let upstream = spawn_upstream(vec![date!(2024 - 03 - 01)]).await;
    let pipeline = Pipeline::new(client(upstream), SqliteGenerationStore::new(db.clone()), fast_settings());

    let err = pipeline.run("2024-03-01", "2024-03-02").await.unwrap_err();
    assert!(matches!(err, PipelineError::NoData { failed_chunks: 1 }));
    assert_eq!(count_records(db.pool()).await.unwrap(), 0);
}
