// ABOUTME: Candidate records: raw, unvalidated text fields tagged with an entity type and origin.
// ABOUTME: Parses each field per its registry type and validates into a Record via the codec.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, Row, Scalar, decode};
use crate::entity::EntityType;
use crate::model::{Record, ValidationError, format_timestamp, parse_timestamp};
use crate::registry::{PrimitiveType, describe};

/// An input record prior to validation. Field values are raw text; empty
/// or whitespace-only text counts as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub entity: EntityType,
    /// Where the candidate came from, e.g. `hired_employees.csv:12`.
    pub origin: String,
    pub fields: BTreeMap<String, String>,
}

impl Candidate {
    pub fn new(entity: EntityType, origin: impl Into<String>) -> Self {
        Self {
            entity,
            origin: origin.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// The raw identity text, if any, for log context.
    pub fn raw_id(&self) -> Option<&str> {
        self.value("id")
    }

    fn value(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Parse and validate into a typed record. Hire timestamps are checked
    /// against the wall clock at the moment of this call.
    pub fn to_record(&self) -> Result<Record, ValidationError> {
        let row = self.to_row()?;
        decode(&row, self.entity).map_err(|e| match e {
            CodecError::Invalid { source, .. } => source,
            CodecError::MalformedRow { reason, .. } => ValidationError::Malformed(reason),
        })
    }

    /// Convert raw text into a registry-typed row. Timestamps are
    /// normalized to canonical RFC 3339 UTC.
    fn to_row(&self) -> Result<Row, ValidationError> {
        let schema = describe(self.entity);
        if let Some(extra) = self.fields.keys().find(|name| schema.field(name).is_none()) {
            return Err(ValidationError::Malformed(format!(
                "unexpected field '{extra}' for {}",
                self.entity
            )));
        }

        let mut row = Row::new();

        for spec in schema.fields {
            let Some(raw) = self.value(spec.name) else {
                if spec.nullable {
                    continue;
                }
                return Err(ValidationError::MissingField(spec.name.to_string()));
            };

            let invalid = |reason: String| ValidationError::InvalidValue {
                field: spec.name.to_string(),
                value: raw.to_string(),
                reason,
            };

            let scalar = match spec.primitive {
                PrimitiveType::Int32 => Scalar::Int32(parse_integer(raw).map_err(invalid)?),
                PrimitiveType::Int64 => Scalar::Int64(parse_integer(raw).map_err(invalid)?),
                PrimitiveType::Utf8 => Scalar::Utf8(raw.to_string()),
                PrimitiveType::Timestamp => {
                    let ts = parse_timestamp(raw).map_err(|e| invalid(e.to_string()))?;
                    Scalar::Utf8(format_timestamp(&ts))
                }
            };
            row.insert(spec.name.to_string(), scalar);
        }

        Ok(row)
    }
}

/// Parse an integer cell. Spreadsheet exports often write whole numbers
/// as `12.0`; those are accepted, fractional values are not.
fn parse_integer<T>(raw: &str) -> Result<T, String>
where
    T: std::str::FromStr + TryFrom<i64>,
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    match raw.parse::<T>() {
        Ok(v) => Ok(v),
        Err(e) => {
            let whole = raw
                .strip_suffix(".0")
                .and_then(|w| w.parse::<i64>().ok())
                .and_then(|w| T::try_from(w).ok());
            whole.ok_or_else(|| e.to_string())
        }
    }
}
