//! Record-level clean-up between fetching and storage.

pub mod dedup;
pub mod normalize;
pub mod quality;

pub use dedup::deduplicate_data;
pub use normalize::{handle_missing_fields, MissingFieldStats, Normalized};
pub use quality::{
    validate_data_quality, validate_processed_data, QualityError, QualityReport, RawQualityReport,
};
