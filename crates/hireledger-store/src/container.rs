// ABOUTME: Self-describing binary container: one Parquet file per entity, schema descriptor in the footer.
// ABOUTME: Streaming writer (row groups, atomic rename) and lazy row reader, both driven by the registry.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Int32Array, Int32Builder, Int64Array, Int64Builder, StringArray,
    StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use hireledger_core::{EntitySchema, EntityType, PrimitiveType, Row, Scalar, SchemaDescriptor, describe};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use thiserror::Error;

/// Footer key under which the registry descriptor is stored as JSON.
pub const DESCRIPTOR_KEY: &str = "hireledger.schema";

/// Errors raised while writing or reading a container file.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("container has no '{DESCRIPTOR_KEY}' schema descriptor")]
    MissingDescriptor,

    #[error("container holds unknown record type '{0}'")]
    UnknownRecord(String),

    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("row does not fit the {entity} schema: {reason}")]
    RowShape { entity: EntityType, reason: String },
}

/// Tuning for container files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOptions {
    /// Rows buffered before a row group is flushed; also the read batch size.
    pub row_group_size: usize,
    /// ZSTD compression level (1-22).
    pub compression_level: i32,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            row_group_size: 10_000,
            compression_level: 3,
        }
    }
}

/// Path of the container file for an entity type inside `dir`.
pub fn container_path(dir: &Path, entity: EntityType) -> PathBuf {
    dir.join(format!("{}.parquet", entity.table_name()))
}

/// Arrow schema for an entity, in registry field order.
pub fn arrow_schema(schema: &EntitySchema) -> Schema {
    Schema::new(
        schema
            .fields
            .iter()
            .map(|f| Field::new(f.name, data_type(f.primitive), f.nullable))
            .collect::<Vec<_>>(),
    )
}

fn data_type(primitive: PrimitiveType) -> DataType {
    match primitive {
        PrimitiveType::Int32 => DataType::Int32,
        PrimitiveType::Int64 => DataType::Int64,
        PrimitiveType::Utf8 | PrimitiveType::Timestamp => DataType::Utf8,
    }
}

enum ColumnBuilder {
    Int32(Int32Builder),
    Int64(Int64Builder),
    Utf8(StringBuilder),
}

impl ColumnBuilder {
    fn new(primitive: PrimitiveType) -> Self {
        match primitive {
            PrimitiveType::Int32 => ColumnBuilder::Int32(Int32Builder::new()),
            PrimitiveType::Int64 => ColumnBuilder::Int64(Int64Builder::new()),
            PrimitiveType::Utf8 | PrimitiveType::Timestamp => ColumnBuilder::Utf8(StringBuilder::new()),
        }
    }

    fn append(&mut self, value: Option<&Scalar>) -> Result<(), String> {
        match (self, value) {
            (ColumnBuilder::Int32(b), Some(Scalar::Int32(v))) => b.append_value(*v),
            (ColumnBuilder::Int32(b), None) => b.append_null(),
            (ColumnBuilder::Int64(b), Some(Scalar::Int64(v))) => b.append_value(*v),
            (ColumnBuilder::Int64(b), None) => b.append_null(),
            (ColumnBuilder::Utf8(b), Some(Scalar::Utf8(v))) => b.append_value(v),
            (ColumnBuilder::Utf8(b), None) => b.append_null(),
            (_, Some(other)) => return Err(format!("unexpected value {other:?}")),
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Int32(b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
        }
    }
}

/// Streams rows into a container file.
///
/// Rows are buffered in Arrow builders and flushed as one row group every
/// `row_group_size` rows. Everything is written to `<file>.tmp`; only
/// [`ContainerWriter::finish`] fsyncs and renames it over the target, so a
/// writer that is dropped early leaves any previous container untouched.
pub struct ContainerWriter {
    schema: &'static EntitySchema,
    arrow: SchemaRef,
    builders: Vec<ColumnBuilder>,
    buffered: usize,
    rows_written: u64,
    row_group_size: usize,
    writer: Option<ArrowWriter<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

impl ContainerWriter {
    pub fn create(
        path: &Path,
        entity: EntityType,
        options: ContainerOptions,
    ) -> Result<Self, ContainerError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let schema = describe(entity);
        let arrow: SchemaRef = Arc::new(arrow_schema(schema));
        let row_group_size = options.row_group_size.max(1);
        let descriptor = serde_json::to_string(&schema.descriptor())?;

        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::try_new(options.compression_level)?))
            .set_max_row_group_size(row_group_size)
            .set_key_value_metadata(Some(vec![KeyValue::new(
                DESCRIPTOR_KEY.to_string(),
                descriptor,
            )]))
            .build();

        let tmp_path = path.with_extension("parquet.tmp");
        let file = File::create(&tmp_path)?;
        let writer = ArrowWriter::try_new(file, Arc::clone(&arrow), Some(props))?;

        Ok(Self {
            schema,
            arrow,
            builders: schema.fields.iter().map(|f| ColumnBuilder::new(f.primitive)).collect(),
            buffered: 0,
            rows_written: 0,
            row_group_size,
            writer: Some(writer),
            tmp_path,
            final_path: path.to_path_buf(),
        })
    }

    /// Append one encoded row. Every declared non-null field must be
    /// present with the declared primitive type.
    pub fn append(&mut self, row: &Row) -> Result<(), ContainerError> {
        let entity = self.schema.entity;
        // Checked up front so a bad row never leaves the builders uneven.
        for spec in self.schema.fields {
            match row.get(spec.name) {
                None if !spec.nullable => {
                    return Err(ContainerError::RowShape {
                        entity,
                        reason: format!("required field '{}' is absent", spec.name),
                    });
                }
                Some(value) if !value.fits(spec.primitive) => {
                    return Err(ContainerError::RowShape {
                        entity,
                        reason: format!("field '{}' holds {value:?}", spec.name),
                    });
                }
                _ => {}
            }
        }

        for (spec, builder) in self.schema.fields.iter().zip(self.builders.iter_mut()) {
            builder
                .append(row.get(spec.name))
                .map_err(|reason| ContainerError::RowShape { entity, reason })?;
        }

        self.buffered += 1;
        if self.buffered >= self.row_group_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ContainerError> {
        if self.buffered == 0 {
            return Ok(());
        }
        let columns: Vec<ArrayRef> = self.builders.iter_mut().map(ColumnBuilder::finish).collect();
        let batch = RecordBatch::try_new(Arc::clone(&self.arrow), columns)?;
        if let Some(writer) = self.writer.as_mut() {
            writer.write(&batch)?;
        }
        self.rows_written += self.buffered as u64;
        self.buffered = 0;
        Ok(())
    }

    /// Flush remaining rows, close the file, and atomically move it into
    /// place. Returns the number of rows written.
    pub fn finish(mut self) -> Result<u64, ContainerError> {
        self.flush()?;
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        File::open(&self.tmp_path)?.sync_all()?;
        fs::rename(&self.tmp_path, &self.final_path)?;

        // Best-effort: make the rename itself durable.
        if let Some(parent) = self.final_path.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }

        Ok(self.rows_written)
    }
}

impl Drop for ContainerWriter {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Read the schema descriptor from a container footer.
pub fn read_descriptor(path: &Path) -> Result<SchemaDescriptor, ContainerError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    descriptor_of(&builder)
}

fn descriptor_of(builder: &ParquetRecordBatchReaderBuilder<File>) -> Result<SchemaDescriptor, ContainerError> {
    let raw = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kvs| kvs.iter().find(|kv| kv.key == DESCRIPTOR_KEY))
        .and_then(|kv| kv.value.as_deref())
        .ok_or(ContainerError::MissingDescriptor)?;
    Ok(serde_json::from_str(raw)?)
}

/// Lazily yields rows from a container file, one record batch at a time.
pub struct ContainerReader {
    schema: &'static EntitySchema,
    batches: ParquetRecordBatchReader,
    current: Option<RecordBatch>,
    next_row: usize,
}

impl std::fmt::Debug for ContainerReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerReader")
            .field("entity", &self.schema.entity)
            .field("next_row", &self.next_row)
            .finish_non_exhaustive()
    }
}

impl ContainerReader {
    /// Open a container expected to hold `entity` rows. The embedded
    /// descriptor and column layout must match the registry exactly.
    pub fn open(path: &Path, entity: EntityType, batch_size: usize) -> Result<Self, ContainerError> {
        Self::open_inner(path, Some(entity), batch_size)
    }

    /// Open a container of any known entity type, identified by its
    /// embedded descriptor.
    pub fn open_any(path: &Path, batch_size: usize) -> Result<Self, ContainerError> {
        Self::open_inner(path, None, batch_size)
    }

    fn open_inner(
        path: &Path,
        expected: Option<EntityType>,
        batch_size: usize,
    ) -> Result<Self, ContainerError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
        let found = descriptor_of(&builder)?;

        let entity = match expected {
            Some(entity) => entity,
            None => EntityType::from_record_name(&found.record)
                .ok_or_else(|| ContainerError::UnknownRecord(found.record.clone()))?,
        };
        let schema = describe(entity);

        let wanted = schema.descriptor();
        if found != wanted {
            return Err(ContainerError::SchemaMismatch {
                expected: serde_json::to_string(&wanted)?,
                found: serde_json::to_string(&found)?,
            });
        }
        check_columns(schema, builder.schema())?;

        let batches = builder.with_batch_size(batch_size.max(1)).build()?;
        Ok(Self {
            schema,
            batches,
            current: None,
            next_row: 0,
        })
    }

    pub fn entity(&self) -> EntityType {
        self.schema.entity
    }

    fn row_at(&self, batch: &RecordBatch, index: usize) -> Result<Row, ContainerError> {
        let mut row = Row::new();
        for (i, spec) in self.schema.fields.iter().enumerate() {
            let column = batch.column(i);
            if column.is_null(index) {
                continue;
            }
            let value = match spec.primitive {
                PrimitiveType::Int32 => column
                    .as_any()
                    .downcast_ref::<Int32Array>()
                    .map(|a| Scalar::Int32(a.value(index))),
                PrimitiveType::Int64 => column
                    .as_any()
                    .downcast_ref::<Int64Array>()
                    .map(|a| Scalar::Int64(a.value(index))),
                PrimitiveType::Utf8 | PrimitiveType::Timestamp => column
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .map(|a| Scalar::Utf8(a.value(index).to_string())),
            };
            let value = value.ok_or_else(|| ContainerError::RowShape {
                entity: self.schema.entity,
                reason: format!("column '{}' has type {}", spec.name, column.data_type()),
            })?;
            row.insert(spec.name.to_string(), value);
        }
        Ok(row)
    }
}

impl Iterator for ContainerReader {
    type Item = Result<Row, ContainerError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(batch) = &self.current
                && self.next_row < batch.num_rows()
            {
                let row = self.row_at(batch, self.next_row);
                self.next_row += 1;
                return Some(row);
            }

            match self.batches.next()? {
                Ok(batch) => {
                    self.current = Some(batch);
                    self.next_row = 0;
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

fn check_columns(schema: &EntitySchema, found: &SchemaRef) -> Result<(), ContainerError> {
    let wanted = arrow_schema(schema);
    let matches = wanted.fields().len() == found.fields().len()
        && wanted.fields().iter().zip(found.fields().iter()).all(|(w, f)| {
            w.name() == f.name() && w.data_type() == f.data_type() && w.is_nullable() == f.is_nullable()
        });
    if matches {
        return Ok(());
    }

    let describe_fields = |s: &Schema| {
        s.fields()
            .iter()
            .map(|f| format!("{}:{}{}", f.name(), f.data_type(), if f.is_nullable() { "?" } else { "" }))
            .collect::<Vec<_>>()
            .join(",")
    };
    Err(ContainerError::SchemaMismatch {
        expected: describe_fields(&wanted),
        found: describe_fields(found),
    })
}
