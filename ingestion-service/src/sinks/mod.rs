pub mod generation_store;

pub use generation_store::{RecordFailure, RecordWriteError, SqliteGenerationStore, StoreError, UpsertReport};

use windsolar_client::domain::NormalizedRecord;

/// Write side of the generation store.
#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert-or-update every record on its natural key. Individual bad
    /// records are reported in the result, not raised.
    async fn upsert(&self, records: &[NormalizedRecord]) -> Result<UpsertReport, StoreError>;

    /// Delete every stored record, returning how many were removed.
    async fn clear_all(&self) -> Result<u64, StoreError>;
}
