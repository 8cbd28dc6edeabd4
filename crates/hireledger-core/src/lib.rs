// ABOUTME: Core library for hireledger: records, schema registry, codec, and the batch ingestion engine.
// ABOUTME: Has no I/O of its own; stores are injected through the RecordStore trait.

pub mod candidate;
pub mod codec;
pub mod entity;
pub mod ingest;
pub mod model;
pub mod registry;
pub mod store;
pub mod testing;

pub use candidate::Candidate;
pub use codec::{CodecError, Row, Scalar, decode, encode};
pub use entity::{EntityType, UnknownEntity};
pub use ingest::{BatchResult, FailureKind, RecordOutcome, ingest, ingest_entity};
pub use model::{Department, HiredEmployee, Job, Record, ValidationError};
pub use registry::{
    EntitySchema, FieldSpec, PrimitiveType, RegistryError, SchemaDescriptor, check_registry,
    describe,
};
pub use store::{RecordStore, StoreError, UnitOfWork};
