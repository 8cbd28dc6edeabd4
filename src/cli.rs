// ABOUTME: Command-line interface definition for the hireledger binary.
// ABOUTME: Flags given here override the corresponding HIRELEDGER_* environment settings.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hireledger_core::EntityType;
use hireledger_store::Target;

/// Batch ingestion of departments, jobs and hire records, with Parquet backup and restore
#[derive(Parser, Debug)]
#[command(
    name = "hireledger",
    version,
    after_help = "EXAMPLES:\n    \
        # Load departments.csv, jobs.csv and hired_employees.csv from a directory\n    \
        hireledger load ./data --report load.json\n\n    \
        # Back up every table, then restore into a fresh database\n    \
        hireledger backup all\n    \
        hireledger --database fresh.db restore all"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// SQLite database file [env: HIRELEDGER_DATABASE]
    #[arg(long, global = true, value_name = "FILE")]
    pub database: Option<PathBuf>,

    /// Directory holding backup containers [env: HIRELEDGER_BACKUP_DIR]
    #[arg(long, global = true, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest one CSV file as records of the given entity type
    Ingest {
        /// departments, jobs, or hired_employees
        entity: EntityType,

        /// CSV file to read
        csv: PathBuf,

        #[command(flatten)]
        options: IngestOptions,
    },

    /// Ingest departments.csv, jobs.csv and hired_employees.csv from a directory
    Load {
        dir: PathBuf,

        #[command(flatten)]
        options: IngestOptions,
    },

    /// Write backup containers from the database
    Backup {
        /// "all" or an entity type
        #[arg(default_value = "all")]
        target: Target,
    },

    /// Load backup containers into the database
    Restore {
        /// "all" or an entity type
        #[arg(default_value = "all")]
        target: Target,
    },

    /// Print the descriptor and rows of a backup container as JSON
    Inspect { file: PathBuf },
}

#[derive(Args, Debug)]
pub struct IngestOptions {
    /// Records per transaction [env: HIRELEDGER_BATCH_SIZE]
    #[arg(long, value_name = "NUM")]
    pub batch_size: Option<NonZeroUsize>,

    /// CSV files start with a header row [env: HIRELEDGER_CSV_HEADER]
    #[arg(long)]
    pub header: bool,

    /// Write the ingestion result as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}
