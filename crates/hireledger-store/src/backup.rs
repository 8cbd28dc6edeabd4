// ABOUTME: Backup Writer: dumps every stored record of one entity type into its container file.
// ABOUTME: Reads the store before touching disk so a failed query never replaces an existing backup.

use std::path::{Path, PathBuf};

use hireledger_core::{EntityType, RecordStore, StoreError, encode};
use thiserror::Error;

use crate::container::{ContainerError, ContainerOptions, ContainerWriter, container_path};

/// Errors that can occur while writing a backup.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("container error: {0}")]
    Container(#[from] ContainerError),
}

/// Write all `entity` records from `store` to `<dir>/<table>.parquet`,
/// replacing any previous backup. Returns the path written.
pub fn backup<S: RecordStore>(
    store: &S,
    entity: EntityType,
    dir: &Path,
    options: ContainerOptions,
) -> Result<PathBuf, BackupError> {
    let path = container_path(dir, entity);

    let records = store.fetch_all(entity).inspect_err(|e| {
        tracing::error!(entity = %entity, path = %path.display(), error = %e, "backup query failed");
    })?;

    let mut writer = ContainerWriter::create(&path, entity, options)?;
    for record in &records {
        tracing::debug!(entity = %entity, id = record.id(), "backing up record");
        writer.append(&encode(record))?;
    }
    let written = writer.finish()?;

    tracing::info!(entity = %entity, path = %path.display(), rows = written, "backup written");
    Ok(path)
}
