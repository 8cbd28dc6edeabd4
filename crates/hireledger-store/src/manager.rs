// ABOUTME: Operations manager: the entry points for ingestion, backup, restore, and inspection.
// ABOUTME: Owns an injected store handle plus the backup directory and tuning knobs.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hireledger_core::{
    BatchResult, Candidate, EntityType, RecordStore, Row, SchemaDescriptor, StoreError,
    UnknownEntity, ingest_entity,
};
use serde::Serialize;
use thiserror::Error;

use crate::backup::{BackupError, backup};
use crate::container::{ContainerError, ContainerOptions, ContainerReader, read_descriptor};
use crate::csv_input::{CsvError, CsvSource, HeaderMode};
use crate::restore::{RestoreError, restore};

/// Batch size used when none is configured.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

/// Errors that can occur during manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("csv error: {0}")]
    Csv(#[from] CsvError),

    #[error("backup of {entity} failed: {source}")]
    Backup {
        entity: EntityType,
        #[source]
        source: BackupError,
    },

    #[error("restore of {entity} failed: {source}")]
    Restore {
        entity: EntityType,
        #[source]
        source: RestoreError,
    },

    #[error("cannot inspect {}: {source}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },
}

/// Which entity types a backup or restore covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    One(EntityType),
}

impl Target {
    /// The covered entity types in dependency order.
    pub fn entities(self) -> Vec<EntityType> {
        match self {
            Target::All => EntityType::ALL.to_vec(),
            Target::One(entity) => vec![entity],
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("all"),
            Target::One(entity) => write!(f, "{entity}"),
        }
    }
}

impl FromStr for Target {
    type Err = UnknownEntity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Target::All);
        }
        s.parse().map(Target::One)
    }
}

/// The decoded contents of a container file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub entity: EntityType,
    pub descriptor: SchemaDescriptor,
    pub rows: Vec<Row>,
}

/// High-level operations over one store handle.
pub struct Operations<S> {
    store: S,
    backup_dir: PathBuf,
    container: ContainerOptions,
    batch_size: NonZeroUsize,
    header: HeaderMode,
}

impl<S: RecordStore> Operations<S> {
    pub fn new(store: S, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            backup_dir: backup_dir.into(),
            container: ContainerOptions::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            header: HeaderMode::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: NonZeroUsize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_header_mode(mut self, header: HeaderMode) -> Self {
        self.header = header;
        self
    }

    pub fn with_container_options(mut self, options: ContainerOptions) -> Self {
        self.container = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Ingest candidates for one entity type. Candidates tagged with a
    /// different entity type fail validation individually.
    pub fn ingest_batch<I>(&mut self, entity: EntityType, candidates: I) -> Result<BatchResult, ManagerError>
    where
        I: IntoIterator<Item = Candidate>,
    {
        Ok(ingest_entity(&mut self.store, entity, candidates, self.batch_size)?)
    }

    /// Stream a CSV file into the store. Batches committed before a read
    /// error stay committed; the read error is still reported.
    pub fn ingest_csv(&mut self, entity: EntityType, path: &Path) -> Result<BatchResult, ManagerError> {
        tracing::info!(entity = %entity, path = %path.display(), "ingesting csv");
        let mut source = CsvSource::open(path, entity, self.header)?;
        let result = ingest_entity(&mut self.store, entity, &mut source, self.batch_size)?;
        if let Err(e) = source.finish() {
            tracing::error!(
                entity = %entity,
                path = %path.display(),
                succeeded = result.succeeded,
                "csv ingestion stopped early"
            );
            return Err(e.into());
        }
        Ok(result)
    }

    /// Load `departments.csv`, `jobs.csv` and `hired_employees.csv` from a
    /// directory in dependency order. Missing files are skipped.
    pub fn load_directory(&mut self, dir: &Path) -> Result<Vec<(EntityType, BatchResult)>, ManagerError> {
        let mut results = Vec::new();
        for entity in EntityType::ALL {
            let path = dir.join(format!("{}.csv", entity.table_name()));
            if !path.is_file() {
                tracing::warn!(entity = %entity, path = %path.display(), "csv file not found, skipping");
                continue;
            }
            let result = self.ingest_csv(entity, &path)?;
            results.push((entity, result));
        }
        Ok(results)
    }

    /// Back up the targeted entity types, stopping at the first failure.
    pub fn run_backup(&self, target: Target) -> Result<Vec<PathBuf>, ManagerError> {
        target
            .entities()
            .into_iter()
            .map(|entity| {
                backup(&self.store, entity, &self.backup_dir, self.container)
                    .map_err(|source| ManagerError::Backup { entity, source })
            })
            .collect()
    }

    /// Restore the targeted entity types, stopping at the first failure.
    /// Returns the number of records restored per entity type.
    pub fn run_restore(&mut self, target: Target) -> Result<Vec<(EntityType, u64)>, ManagerError> {
        let mut counts = Vec::new();
        for entity in target.entities() {
            let count = restore(&mut self.store, entity, &self.backup_dir, self.container.row_group_size)
                .map_err(|source| ManagerError::Restore { entity, source })?;
            counts.push((entity, count));
        }
        Ok(counts)
    }

    /// Read any container file, identifying its entity type from the
    /// embedded descriptor.
    pub fn inspect(&self, path: &Path) -> Result<Inspection, ManagerError> {
        let failed = |source| ManagerError::Inspect {
            path: path.to_path_buf(),
            source,
        };
        let descriptor = read_descriptor(path).map_err(failed)?;
        let reader = ContainerReader::open_any(path, self.container.row_group_size).map_err(failed)?;
        let entity = reader.entity();
        let rows = reader.collect::<Result<Vec<_>, _>>().map_err(failed)?;
        Ok(Inspection {
            entity,
            descriptor,
            rows,
        })
    }
}
