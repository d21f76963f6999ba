use std::collections::BTreeMap;

use windsolar_client::domain::{ExpectedField, NormalizedRecord, RawObservation};

/// How many records lacked each expected field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingFieldStats {
    pub total_records: usize,
    pub counts: BTreeMap<ExpectedField, usize>,
}

impl MissingFieldStats {
    pub fn count(&self, field: ExpectedField) -> usize {
        self.counts.get(&field).copied().unwrap_or(0)
    }

    pub fn percentage(&self, field: ExpectedField) -> f64 {
        if self.total_records == 0 {
            return 0.0;
        }
        self.count(field) as f64 / self.total_records as f64 * 100.0
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<NormalizedRecord>,
    pub missing: MissingFieldStats,
}

/// Widen every record to the nine expected fields, counting the ones that are
/// absent or null. Unknown source keys are carried through as extras.
pub fn handle_missing_fields(records: Vec<RawObservation>) -> Normalized {
    if records.is_empty() {
        return Normalized::default();
    }

    tracing::info!(records = records.len(), "processing missing fields");

    let mut missing = MissingFieldStats {
        total_records: records.len(),
        counts: BTreeMap::new(),
    };

    let normalized = records
        .into_iter()
        .map(|raw| {
            for field in ExpectedField::ALL {
                if raw.fields.is_missing(field) {
                    *missing.counts.entry(field).or_insert(0) += 1;
                }
            }
            NormalizedRecord {
                fields: raw.fields,
                extras: raw.extra,
            }
        })
        .collect();

    if !missing.is_empty() {
        tracing::warn!("missing field statistics:");
        for (field, count) in &missing.counts {
            let percentage = missing.percentage(*field);
            metrics::counter!("normalize_missing_fields_total", "field" => field.wire_name()).increment(*count as u64);
            tracing::warn!(field = field.wire_name(), count, percentage = %format!("{percentage:.1}%"), "missing values");
        }
    }

    Normalized {
        records: normalized,
        missing,
    }
}
