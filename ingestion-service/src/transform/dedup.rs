use indexmap::{map::Entry, IndexMap};
use windsolar_client::domain::{NaturalKey, RawObservation};

/// Collapse observations sharing a natural key to the most recently published one.
///
/// Survivors are emitted in first-seen order of their key. `publishTime` is
/// compared as text (absent sorts as `""`, i.e. oldest); on a tie the earlier
/// observation is kept. Text order only matches time order while the feed uses
/// one fixed-width timestamp format.
pub fn deduplicate_data(records: Vec<RawObservation>) -> Vec<RawObservation> {
    if records.is_empty() {
        return Vec::new();
    }

    let input_len = records.len();
    tracing::info!(records = input_len, "starting deduplication");

    let mut survivors: IndexMap<NaturalKey, RawObservation> = IndexMap::with_capacity(input_len);
    for record in records {
        match survivors.entry(record.natural_key()) {
            Entry::Occupied(mut slot) => {
                if record.publish_time_key() > slot.get().publish_time_key() {
                    slot.insert(record);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }

    let removed = input_len - survivors.len();
    metrics::counter!("dedup_duplicates_removed_total").increment(removed as u64);
    tracing::info!(unique = survivors.len(), duplicates_removed = removed, "deduplication completed");

    survivors.into_values().collect()
}
