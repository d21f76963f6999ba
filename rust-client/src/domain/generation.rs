use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};

/// Fuel types published by the wind & solar generation feed.
///
/// Serializes as the upstream display name; deserializes from it case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum FuelType {
    #[serde(rename = "Wind Offshore")]
    WindOffshore,
    #[serde(rename = "Wind Onshore")]
    WindOnshore,
    #[serde(rename = "Solar")]
    Solar,
}

impl FuelType {
    pub const ALL: [FuelType; 3] = [FuelType::WindOffshore, FuelType::WindOnshore, FuelType::Solar];

    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::WindOffshore => "Wind Offshore",
            FuelType::WindOnshore => "Wind Onshore",
            FuelType::Solar => "Solar",
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuelType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FuelType::ALL
            .into_iter()
            .find(|ft| ft.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RecordError::UnknownFuelType(wanted.to_string()))
    }
}

impl TryFrom<String> for FuelType {
    type Error = RecordError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Per-record conversion failures raised while preparing a record for storage.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("invalid quantity '{0}'")]
    InvalidQuantity(String),
    #[error("invalid {field} '{value}': {reason}")]
    InvalidDate {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("unknown fuel type '{0}'")]
    UnknownFuelType(String),
}

/// Generation quantity as delivered upstream.
///
/// The feed normally sends a JSON number, but decimal values occasionally
/// arrive as strings; both are accepted here and parsed at storage time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(f64),
    Text(String),
}

impl Quantity {
    pub fn to_f64(&self) -> Result<f64, RecordError> {
        match self {
            Quantity::Number(v) => Ok(*v),
            Quantity::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| RecordError::InvalidQuantity(s.clone())),
        }
    }
}

impl From<f64> for Quantity {
    fn from(v: f64) -> Self {
        Quantity::Number(v)
    }
}

/// The fixed schema every normalized record carries, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpectedField {
    PublishTime,
    BusinessType,
    PsrType,
    Quantity,
    StartTime,
    SettlementDate,
    SettlementPeriod,
    FuelType,
    Region,
}

impl ExpectedField {
    pub const ALL: [ExpectedField; 9] = [
        ExpectedField::PublishTime,
        ExpectedField::BusinessType,
        ExpectedField::PsrType,
        ExpectedField::Quantity,
        ExpectedField::StartTime,
        ExpectedField::SettlementDate,
        ExpectedField::SettlementPeriod,
        ExpectedField::FuelType,
        ExpectedField::Region,
    ];

    /// Fields without which a record cannot be keyed or measured.
    pub const CRITICAL: [ExpectedField; 4] = [
        ExpectedField::SettlementDate,
        ExpectedField::SettlementPeriod,
        ExpectedField::PsrType,
        ExpectedField::Quantity,
    ];

    pub fn wire_name(&self) -> &'static str {
        match self {
            ExpectedField::PublishTime => "publishTime",
            ExpectedField::BusinessType => "businessType",
            ExpectedField::PsrType => "psrType",
            ExpectedField::Quantity => "quantity",
            ExpectedField::StartTime => "startTime",
            ExpectedField::SettlementDate => "settlementDate",
            ExpectedField::SettlementPeriod => "settlementPeriod",
            ExpectedField::FuelType => "fuelType",
            ExpectedField::Region => "region",
        }
    }
}

impl fmt::Display for ExpectedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// The closed set of known generation fields. Absent and `null` both map to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFields {
    pub publish_time: Option<String>,
    pub business_type: Option<String>,
    pub psr_type: Option<String>,
    pub quantity: Option<Quantity>,
    pub start_time: Option<String>,
    pub settlement_date: Option<String>,
    pub settlement_period: Option<i64>,
    pub fuel_type: Option<String>,
    pub region: Option<String>,
}

impl GenerationFields {
    pub fn is_missing(&self, field: ExpectedField) -> bool {
        match field {
            ExpectedField::PublishTime => self.publish_time.is_none(),
            ExpectedField::BusinessType => self.business_type.is_none(),
            ExpectedField::PsrType => self.psr_type.is_none(),
            ExpectedField::Quantity => self.quantity.is_none(),
            ExpectedField::StartTime => self.start_time.is_none(),
            ExpectedField::SettlementDate => self.settlement_date.is_none(),
            ExpectedField::SettlementPeriod => self.settlement_period.is_none(),
            ExpectedField::FuelType => self.fuel_type.is_none(),
            ExpectedField::Region => self.region.is_none(),
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            settlement_date: self.settlement_date.clone(),
            settlement_period: self.settlement_period,
            psr_type: self.psr_type.clone(),
        }
    }
}

/// One observation in canonical wire shape, as produced by the chunk fetcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    #[serde(flatten)]
    pub fields: GenerationFields,
    /// Keys outside the known schema, carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RawObservation {
    pub fn natural_key(&self) -> NaturalKey {
        self.fields.natural_key()
    }

    /// Publish time as used for "most recent" ordering; absent sorts first.
    pub fn publish_time_key(&self) -> &str {
        self.fields.publish_time.as_deref().unwrap_or("")
    }
}

/// (settlement date, settlement period, psr type): identifies one logical observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NaturalKey {
    pub settlement_date: Option<String>,
    pub settlement_period: Option<i64>,
    pub psr_type: Option<String>,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_dash<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref().map_or_else(|| "-".to_string(), |v| v.to_string())
        }
        write!(
            f,
            "{}/{}/{}",
            or_dash(&self.settlement_date),
            or_dash(&self.settlement_period),
            or_dash(&self.psr_type)
        )
    }
}

/// A record widened to the full expected schema. Serializes every known field,
/// `null` included, followed by any passthrough extras.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(flatten)]
    pub fields: GenerationFields,
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

impl NormalizedRecord {
    pub fn natural_key(&self) -> NaturalKey {
        self.fields.natural_key()
    }

    /// Parse into the typed shape the store writes.
    pub fn to_new_record(&self) -> Result<NewGenerationRecord, RecordError> {
        let f = &self.fields;

        let settlement_date = match f.settlement_date.as_deref() {
            Some(s) => parse_settlement_date(s)?,
            None => return Err(RecordError::MissingField("settlementDate")),
        };
        let settlement_period = f
            .settlement_period
            .ok_or(RecordError::MissingField("settlementPeriod"))?;
        let psr_type = f
            .psr_type
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(RecordError::MissingField("psrType"))?;
        let quantity = f.quantity.as_ref().map(Quantity::to_f64).transpose()?;

        Ok(NewGenerationRecord {
            publish_time: parse_optional_timestamp("publishTime", f.publish_time.as_deref())?,
            business_type: f.business_type.clone(),
            psr_type,
            quantity,
            start_time: parse_optional_timestamp("startTime", f.start_time.as_deref())?,
            settlement_date,
            settlement_period,
            fuel_type: f.fuel_type.clone(),
            region: Some(f.region.clone().unwrap_or_else(|| "GB".to_string())),
        })
    }
}

pub fn parse_settlement_date(s: &str) -> Result<Date, RecordError> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).map_err(|e| RecordError::InvalidDate {
        field: "settlementDate",
        value: s.to_string(),
        reason: e.to_string(),
    })
}

fn parse_optional_timestamp(field: &'static str, s: Option<&str>) -> Result<Option<OffsetDateTime>, RecordError> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => OffsetDateTime::parse(v, &Rfc3339)
            .map(Some)
            .map_err(|e| RecordError::InvalidDate {
                field,
                value: v.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Typed record ready to be written by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGenerationRecord {
    pub publish_time: Option<OffsetDateTime>,
    pub business_type: Option<String>,
    pub psr_type: String,
    pub quantity: Option<f64>,
    pub start_time: Option<OffsetDateTime>,
    pub settlement_date: Date,
    pub settlement_period: i64,
    pub fuel_type: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredRecord {
    pub id: i64,
    pub publish_time: Option<OffsetDateTime>,
    pub business_type: Option<String>,
    pub psr_type: String,
    pub quantity: Option<f64>,
    pub start_time: Option<OffsetDateTime>,
    pub settlement_date: Date,
    pub settlement_period: i64,
    pub fuel_type: Option<String>,
    pub region: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
