// ABOUTME: Schema Registry declaring field names, primitive types, and nullability per entity type.
// ABOUTME: Single source of truth consulted by candidate parsing, the codec, backup, and restore.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityType;

/// The primitive types a container column can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Int32,
    Int64,
    Utf8,
    /// An ISO-8601 timestamp carried as a UTF-8 string.
    Timestamp,
}

/// One declared field of an entity schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub primitive: PrimitiveType,
    pub nullable: bool,
}

const fn field(name: &'static str, primitive: PrimitiveType, nullable: bool) -> FieldSpec {
    FieldSpec {
        name,
        primitive,
        nullable,
    }
}

/// The declared structural schema of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub entity: EntityType,
    pub fields: &'static [FieldSpec],
}

impl EntitySchema {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Owned, serializable form of this schema, embedded in container files.
    pub fn descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor {
            record: self.entity.record_name().to_string(),
            fields: self
                .fields
                .iter()
                .map(|f| FieldDescriptor {
                    name: f.name.to_string(),
                    primitive: f.primitive,
                    nullable: f.nullable,
                })
                .collect(),
        }
    }
}

/// Serialized schema descriptor: record name plus ordered field list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub record: String,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub primitive: PrimitiveType,
    pub nullable: bool,
}

/// Name of the identity field every schema starts with.
pub const IDENTITY_FIELD: &str = "id";

const DEPARTMENT_FIELDS: &[FieldSpec] = &[
    field(IDENTITY_FIELD, PrimitiveType::Int32, false),
    field("department", PrimitiveType::Utf8, false),
];

const JOB_FIELDS: &[FieldSpec] = &[
    field(IDENTITY_FIELD, PrimitiveType::Int32, false),
    field("job", PrimitiveType::Utf8, false),
];

const HIRED_EMPLOYEE_FIELDS: &[FieldSpec] = &[
    field(IDENTITY_FIELD, PrimitiveType::Int32, false),
    field("name", PrimitiveType::Utf8, false),
    field("datetime", PrimitiveType::Timestamp, false),
    field("department_id", PrimitiveType::Int32, false),
    field("job_id", PrimitiveType::Int32, true),
];

static SCHEMAS: [EntitySchema; 3] = [
    EntitySchema {
        entity: EntityType::Department,
        fields: DEPARTMENT_FIELDS,
    },
    EntitySchema {
        entity: EntityType::Job,
        fields: JOB_FIELDS,
    },
    EntitySchema {
        entity: EntityType::HiredEmployee,
        fields: HIRED_EMPLOYEE_FIELDS,
    },
];

/// Return the declared schema for an entity type.
pub fn describe(entity: EntityType) -> &'static EntitySchema {
    match entity {
        EntityType::Department => &SCHEMAS[0],
        EntityType::Job => &SCHEMAS[1],
        EntityType::HiredEmployee => &SCHEMAS[2],
    }
}

/// A structural defect in the registry table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{entity}: schema declares no fields")]
    Empty { entity: EntityType },

    #[error("{entity}: first field must be a non-null integer 'id'")]
    MissingIdentity { entity: EntityType },

    #[error("{entity}: field '{field}' declared more than once")]
    DuplicateField { entity: EntityType, field: String },

    #[error("{entity}: registry slot holds the schema for {found}")]
    Misplaced { entity: EntityType, found: EntityType },
}

/// Check the registry once at process start.
pub fn check_registry() -> Result<(), RegistryError> {
    for entity in EntityType::ALL {
        let schema = describe(entity);
        if schema.entity != entity {
            return Err(RegistryError::Misplaced {
                entity,
                found: schema.entity,
            });
        }

        let Some(first) = schema.fields.first() else {
            return Err(RegistryError::Empty { entity });
        };
        let integer = matches!(first.primitive, PrimitiveType::Int32 | PrimitiveType::Int64);
        if first.name != IDENTITY_FIELD || first.nullable || !integer {
            return Err(RegistryError::MissingIdentity { entity });
        }

        for (i, f) in schema.fields.iter().enumerate() {
            if schema.fields[..i].iter().any(|prev| prev.name == f.name) {
                return Err(RegistryError::DuplicateField {
                    entity,
                    field: f.name.to_string(),
                });
            }
        }
    }
    Ok(())
}
