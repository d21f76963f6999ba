pub mod generation;

pub use generation::{
    ExpectedField, FuelType, GenerationFields, NaturalKey, NewGenerationRecord, NormalizedRecord,
    Quantity, RawObservation, RecordError, StoredRecord,
};
