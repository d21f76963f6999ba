pub mod chunks;
pub mod elexon;
pub mod orchestrator;

pub use chunks::{plan_chunks, DateChunk, DateChunks, RangeError};
pub use elexon::{ElexonClient, FetchError, RetryPolicy};
pub use orchestrator::{failed_date_ranges, fetch_generation_data, FetchOutcome, FetchSettings};

use windsolar_client::domain::RawObservation;

/// Anything that can produce the observations for one bounded date chunk.
#[async_trait::async_trait]
pub trait ChunkSource: Send + Sync {
    async fn fetch_chunk(&self, chunk: DateChunk) -> Result<Vec<RawObservation>, FetchError>;
}
