// ABOUTME: Record Codec translating typed records to and from registry-shaped rows of scalars.
// ABOUTME: Timestamps travel as RFC 3339 strings; decode re-validates through the record constructors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityType;
use crate::model::{
    Department, HiredEmployee, Job, Record, ValidationError, format_timestamp, parse_timestamp,
};
use crate::registry::{FieldSpec, PrimitiveType, describe};

/// A container-representable value. Null is the absence of a key in a [`Row`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int32(i32),
    Int64(i64),
    Utf8(String),
}

impl Scalar {
    /// Whether this scalar can carry a value of the given primitive type.
    pub fn fits(&self, primitive: PrimitiveType) -> bool {
        matches!(
            (self, primitive),
            (Scalar::Int32(_), PrimitiveType::Int32)
                | (Scalar::Int64(_), PrimitiveType::Int64)
                | (Scalar::Utf8(_), PrimitiveType::Utf8 | PrimitiveType::Timestamp)
        )
    }
}

/// One encoded record: field name to value, nulls omitted.
pub type Row = BTreeMap<String, Scalar>;

/// Errors raised while decoding a row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed {entity} row: {reason}")]
    MalformedRow { entity: EntityType, reason: String },

    #[error("invalid {entity} row: {source}")]
    Invalid {
        entity: EntityType,
        #[source]
        source: ValidationError,
    },
}

/// Project a record onto the fields its registry entry declares.
pub fn encode(record: &Record) -> Row {
    let schema = describe(record.entity());
    schema
        .fields
        .iter()
        .filter_map(|f| field_value(record, f.name).map(|v| (f.name.to_string(), v)))
        .collect()
}

fn field_value(record: &Record, name: &str) -> Option<Scalar> {
    match (record, name) {
        (record, "id") => Some(Scalar::Int32(record.id())),
        (Record::Department(d), "department") => Some(Scalar::Utf8(d.name.clone())),
        (Record::Job(j), "job") => Some(Scalar::Utf8(j.title.clone())),
        (Record::HiredEmployee(e), "name") => Some(Scalar::Utf8(e.name.clone())),
        (Record::HiredEmployee(e), "datetime") => Some(Scalar::Utf8(format_timestamp(&e.hired_at))),
        (Record::HiredEmployee(e), "department_id") => Some(Scalar::Int32(e.department_id)),
        (Record::HiredEmployee(e), "job_id") => e.job_id.map(Scalar::Int32),
        _ => None,
    }
}

/// Rebuild a typed record from a row. Fields not declared in the registry
/// are ignored; a missing nullable field decodes to `None`.
pub fn decode(row: &Row, entity: EntityType) -> Result<Record, CodecError> {
    let fields = RowFields { row, entity };
    let record = match entity {
        EntityType::Department => {
            Department::new(fields.int32("id")?, fields.text("department")?).map(Record::from)
        }
        EntityType::Job => Job::new(fields.int32("id")?, fields.text("job")?).map(Record::from),
        EntityType::HiredEmployee => HiredEmployee::new(
            fields.int32("id")?,
            fields.text("name")?,
            fields.timestamp("datetime")?,
            fields.int32("department_id")?,
            fields.optional_int32("job_id")?,
        )
        .map(Record::from),
    };
    record.map_err(|source| CodecError::Invalid { entity, source })
}

struct RowFields<'a> {
    row: &'a Row,
    entity: EntityType,
}

impl RowFields<'_> {
    fn malformed(&self, reason: String) -> CodecError {
        CodecError::MalformedRow {
            entity: self.entity,
            reason,
        }
    }

    fn spec(&self, name: &str) -> Result<&'static FieldSpec, CodecError> {
        describe(self.entity)
            .field(name)
            .ok_or_else(|| self.malformed(format!("field '{name}' is not declared")))
    }

    /// Fetch a field, checking presence against nullability and the value
    /// against the declared primitive type.
    fn lookup(&self, name: &str) -> Result<Option<&Scalar>, CodecError> {
        let spec = self.spec(name)?;
        match self.row.get(name) {
            None if spec.nullable => Ok(None),
            None => Err(self.malformed(format!("required field '{name}' is absent"))),
            Some(value) if value.fits(spec.primitive) => Ok(Some(value)),
            Some(value) => Err(self.malformed(format!(
                "field '{name}' expected {:?}, found {value:?}",
                spec.primitive
            ))),
        }
    }

    fn optional_int32(&self, name: &str) -> Result<Option<i32>, CodecError> {
        match self.lookup(name)? {
            Some(Scalar::Int32(v)) => Ok(Some(*v)),
            Some(other) => Err(self.malformed(format!("field '{name}' is not an int32: {other:?}"))),
            None => Ok(None),
        }
    }

    fn int32(&self, name: &str) -> Result<i32, CodecError> {
        self.optional_int32(name)?
            .ok_or_else(|| self.malformed(format!("required field '{name}' is null")))
    }

    fn text(&self, name: &str) -> Result<String, CodecError> {
        match self.lookup(name)? {
            Some(Scalar::Utf8(s)) => Ok(s.clone()),
            _ => Err(self.malformed(format!("required field '{name}' is not a string"))),
        }
    }

    fn timestamp(&self, name: &str) -> Result<chrono::DateTime<chrono::Utc>, CodecError> {
        let raw = self.text(name)?;
        parse_timestamp(&raw)
            .map_err(|e| self.malformed(format!("field '{name}' is not an ISO-8601 timestamp '{raw}': {e}")))
    }
}
