// ABOUTME: Persistence layer for hireledger: SQLite store, Parquet backup containers, and CSV sources.
// ABOUTME: Provides the Backup Writer, Restore Reader, and the Operations entry points over an injected store.

pub mod backup;
pub mod container;
pub mod csv_input;
pub mod manager;
pub mod restore;
pub mod sqlite;

pub use backup::{BackupError, backup};
pub use container::{
    ContainerError, ContainerOptions, ContainerReader, ContainerWriter, container_path,
    read_descriptor,
};
pub use csv_input::{CsvError, CsvSource, HeaderMode};
pub use manager::{DEFAULT_BATCH_SIZE, Inspection, ManagerError, Operations, Target};
pub use restore::{RestoreError, restore};
pub use sqlite::{SqliteStore, SqliteTx};
