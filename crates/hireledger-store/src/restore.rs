// ABOUTME: Restore Reader: loads one entity type's container file back into the store.
// ABOUTME: The whole file is one unit of work; any bad row or constraint failure aborts it.

use std::fs;
use std::path::{Path, PathBuf};

use hireledger_core::{CodecError, EntityType, RecordStore, StoreError, UnitOfWork, decode};
use thiserror::Error;

use crate::container::{ContainerError, ContainerReader, container_path};

/// Errors that abort a restore. Every variant is attributable to the whole
/// file; nothing from that file is committed.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("malformed container {}: {source}", path.display())]
    MalformedContainer {
        path: PathBuf,
        #[source]
        source: ContainerError,
    },

    #[error("row {row} of {} does not decode: {source}", path.display())]
    Decode {
        path: PathBuf,
        row: u64,
        #[source]
        source: CodecError,
    },

    #[error("store rejected {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
}

impl RestoreError {
    pub fn path(&self) -> &Path {
        match self {
            RestoreError::MalformedContainer { path, .. }
            | RestoreError::Decode { path, .. }
            | RestoreError::Store { path, .. } => path,
        }
    }
}

/// Restore `entity` from `<dir>/<table>.parquet` into `store`.
///
/// A missing or zero-byte file is not an error: it is logged and zero is
/// returned. Otherwise every row is decoded and inserted inside a single
/// unit of work which is committed only after the last row. Returns the
/// number of records restored.
pub fn restore<S: RecordStore>(
    store: &mut S,
    entity: EntityType,
    dir: &Path,
    batch_size: usize,
) -> Result<u64, RestoreError> {
    let path = container_path(dir, entity);

    let empty = match fs::metadata(&path) {
        Ok(meta) => meta.len() == 0,
        Err(_) => {
            tracing::warn!(entity = %entity, path = %path.display(), "no backup file, nothing to restore");
            return Ok(0);
        }
    };
    if empty {
        tracing::warn!(entity = %entity, path = %path.display(), "backup file is empty, nothing to restore");
        return Ok(0);
    }

    match restore_file(store, entity, &path, batch_size) {
        Ok(count) => {
            tracing::info!(entity = %entity, path = %path.display(), rows = count, "restore committed");
            Ok(count)
        }
        Err(e) => {
            tracing::error!(entity = %entity, path = %path.display(), error = %e, "restore aborted");
            Err(e)
        }
    }
}

fn restore_file<S: RecordStore>(
    store: &mut S,
    entity: EntityType,
    path: &Path,
    batch_size: usize,
) -> Result<u64, RestoreError> {
    let malformed = |source| RestoreError::MalformedContainer {
        path: path.to_path_buf(),
        source,
    };
    let store_failed = |source| RestoreError::Store {
        path: path.to_path_buf(),
        source,
    };

    let reader = ContainerReader::open(path, entity, batch_size).map_err(malformed)?;
    let mut tx = store.begin().map_err(store_failed)?;

    let mut count = 0u64;
    for row in reader {
        let row = row.map_err(malformed)?;
        let record = decode(&row, entity).map_err(|source| RestoreError::Decode {
            path: path.to_path_buf(),
            row: count,
            source,
        })?;
        tracing::debug!(entity = %entity, id = record.id(), "restoring record");
        tx.insert(&record).map_err(store_failed)?;
        count += 1;
    }

    tx.commit().map_err(store_failed)?;
    Ok(count)
}
